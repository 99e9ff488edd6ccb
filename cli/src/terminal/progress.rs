use std::sync::{Arc, Mutex};

use edgerank_core::progress::{Phase, Progress, ProgressEvent};
use indicatif::ProgressStyle;
use tracing::{Span, info_span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

const TEMPLATE: &str = "{spinner:.blue} {msg:<9} [{bar:40.green/black}] {pos}/{len} ({elapsed})";

/// A progress callback that draws one bar per phase.
///
/// Each bar belongs to a span on the indicatif layer; dropping the span removes the bar.
pub fn phase_bar() -> Progress {
    let active: Mutex<Option<Span>> = Mutex::new(None);
    Arc::new(move |event: ProgressEvent| {
        let Ok(mut active) = active.lock() else {
            return;
        };
        match event {
            ProgressEvent::Started { phase, total } => {
                *active = Some(start_bar(phase, total));
            }
            ProgressEvent::Advanced { .. } => {
                if let Some(span) = active.as_ref() {
                    span.pb_inc(1);
                }
            }
            ProgressEvent::Finished { .. } => {
                active.take();
            }
        }
    })
}

fn start_bar(phase: Phase, total: usize) -> Span {
    let span = info_span!("phase", %phase);
    if let Ok(style) = ProgressStyle::with_template(TEMPLATE) {
        span.pb_set_style(&style.progress_chars("━╸ "));
    }
    span.pb_set_length(total as u64);
    span.pb_set_message(&phase.to_string());
    span.pb_start();
    span
}
