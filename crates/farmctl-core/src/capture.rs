//! `tracing` layer that feeds every emitted event into the stats pipeline.

use std::fmt;

use tracing::{
    Event, Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{Layer, layer::Context};

use crate::{extract::LogLine, pipeline::ActionSink};

/// Forwards log events to an [`ActionSink`] as [`LogLine`]s.
///
/// The category comes from a `tag` field (`info!(tag = "农场", "收获3")`),
/// then from a bracketed prefix in the message, then from the event target.
pub struct CaptureLayer {
    sink: ActionSink,
}

impl CaptureLayer {
    #[must_use]
    pub const fn new(sink: ActionSink) -> Self {
        Self { sink }
    }
}

#[derive(Default)]
struct LineVisitor {
    tag: Option<String>,
    message: Option<String>,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "tag" => self.tag = Some(value.to_string()),
            "message" => self.message = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "tag" => self.tag = Some(format!("{value:?}").trim_matches('"').to_string()),
            "message" => self.message = Some(format!("{value:?}")),
            _ => {}
        }
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let metadata = event.metadata();
        let level = metadata.level().to_string();
        let message = visitor.message.unwrap_or_default();

        let line = match visitor.tag {
            Some(tag) => LogLine::new(level, tag, message),
            None => match LogLine::parse(&message) {
                Some(parsed) => LogLine { level, ..parsed },
                None => {
                    let target = metadata.target();
                    let tag = target.rsplit("::").next().unwrap_or(target);
                    LogLine::new(level, tag, message)
                }
            },
        };
        self.sink.line(line);
    }
}
