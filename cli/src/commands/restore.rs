use std::io::Write;

use planflow_core::api::{
    read_record_file, rebuild_for_display, AppConfig, CliError, DisplayView, EngineError,
};
use planflow_plugins::factory::build_record_store;

use super::cli::{OutputFormat, RestoreArgs};

pub fn restore_cmd<W: Write>(
    args: RestoreArgs,
    cfg: &AppConfig,
    out: &mut W,
) -> Result<i32, CliError> {
    let record = match (&args.source.record, &args.source.plan_id) {
        (Some(path), _) => read_record_file(path)?,
        (None, Some(plan_id)) => {
            let store = build_record_store(cfg)?.ok_or_else(|| {
                CliError::Config("records.directory is not configured".to_string())
            })?;
            store.load(plan_id)?
        }
        (None, None) => {
            return Err(CliError::Command(
                "either --plan-id or --record is required".to_string(),
            ))
        }
    };

    let view = rebuild_for_display(&record).map_err(EngineError::from)?;
    match args.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&view)
                .map_err(|e| CliError::Command(format!("serialize view failed: {e}")))?;
            writeln!(out, "{json}")?;
        }
        OutputFormat::Text => write_view(&view, out)?,
    }
    Ok(0)
}

fn write_view<W: Write>(view: &DisplayView, out: &mut W) -> std::io::Result<()> {
    writeln!(out, "PLAN {} (layers: {})", view.plan_id, view.layers.len())?;
    for (idx, layer) in view.layers.iter().enumerate() {
        writeln!(out, "  layer {idx}:")?;
        for step in layer {
            write!(out, "    {} [{}] {}", step.id, step.status, step.tool)?;
            if let Some(err) = &step.error {
                write!(out, ": {err}")?;
            }
            writeln!(out)?;
        }
    }
    Ok(())
}
