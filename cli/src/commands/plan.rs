use std::io::Write;

use planflow_core::api::{build_plan, generate_plan_id, parse_plan, CliError, EngineError};
use tokio::io::AsyncReadExt;

use super::cli::{LayersArgs, OutputFormat, ParseArgs, PlanInput};

pub async fn read_plan_text(input: &PlanInput) -> Result<String, CliError> {
    if let Some(text) = &input.plan {
        return Ok(text.clone());
    }
    if let Some(path) = &input.plan_file {
        return tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CliError::Command(format!("read plan file {path} failed: {e}")));
    }

    let mut buf = String::new();
    tokio::io::stdin().read_to_string(&mut buf).await?;
    Ok(buf)
}

pub async fn parse_cmd<W: Write>(args: ParseArgs, out: &mut W) -> Result<i32, CliError> {
    let raw = read_plan_text(&args.input).await?;
    let steps = parse_plan(&raw).map_err(EngineError::from)?;
    tracing::debug!(steps = steps.len(), "plan text recovered");

    let json = serde_json::to_string_pretty(&steps)
        .map_err(|e| CliError::Command(format!("serialize steps failed: {e}")))?;
    writeln!(out, "{json}")?;
    Ok(0)
}

pub async fn layers_cmd<W: Write>(args: LayersArgs, out: &mut W) -> Result<i32, CliError> {
    let raw = read_plan_text(&args.input).await?;
    let descriptors = parse_plan(&raw).map_err(EngineError::from)?;
    let plan_id = args.plan_id.unwrap_or_else(generate_plan_id);
    let dag = build_plan(plan_id, descriptors).map_err(EngineError::from)?;

    match args.format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "plan_id": dag.plan_id(),
                "layers": dag.layers,
            });
            writeln!(out, "{value}")?;
        }
        OutputFormat::Text => {
            writeln!(
                out,
                "PLAN {} (steps: {}, layers: {})",
                dag.plan_id(),
                dag.step_count(),
                dag.layers.len()
            )?;
            for (idx, layer) in dag.layers.iter().enumerate() {
                writeln!(out, "  layer {}: {}", idx, layer.join(", "))?;
            }
        }
    }
    Ok(0)
}
