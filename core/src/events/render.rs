use std::io::Write;

use super::progress::EventEnvelope;

/// Turns progress events into text. Renderers are subscribers only; they
/// never feed back into engine state.
pub trait EventRenderer: Send + Sync {
    fn name(&self) -> &str;
    fn format(&self) -> &str;
    /// One line per event, or `None` to skip it.
    fn render(&self, envelope: &EventEnvelope) -> Option<String>;
}

/// Renders each envelope onto `out`, one line apiece. Returns lines written.
pub fn render_all<'a, W, I>(
    renderer: &dyn EventRenderer,
    envelopes: I,
    out: &mut W,
) -> std::io::Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a EventEnvelope>,
{
    let mut written = 0;
    for envelope in envelopes {
        if let Some(line) = renderer.render(envelope) {
            writeln!(out, "{line}")?;
            written += 1;
        }
    }
    out.flush()?;
    Ok(written)
}
