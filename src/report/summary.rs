// Invocation end handling shared by every forwarding listener

use std::sync::Arc;

use super::TestInvocationListener;
use super::forwarder::dispatch;
use crate::state::TestSummary;

/// Deliver `invocation_ended` to `listeners`.
///
/// Summaries are gathered from every listener first and handed to all of
/// them through `put_summary`, so a reporter that mails or prints results can
/// include what its siblings produced. A listener that panics in any of the
/// three steps is logged and skipped.
pub fn report_invocation_ended(listeners: &[Arc<dyn TestInvocationListener>], elapsed_ms: u64) {
    let summaries = collect_summaries(listeners);
    if !summaries.is_empty() {
        for listener in listeners {
            dispatch(listener.as_ref(), "put_summary", |l| l.put_summary(&summaries));
        }
    }

    for listener in listeners {
        dispatch(listener.as_ref(), "invocation_ended", |l| {
            l.invocation_ended(elapsed_ms)
        });
    }
}

fn collect_summaries(listeners: &[Arc<dyn TestInvocationListener>]) -> Vec<TestSummary> {
    listeners
        .iter()
        .filter_map(|listener| {
            let mut summary = dispatch(listener.as_ref(), "summary", |l| l.summary()).flatten()?;
            if summary.source.is_none() {
                summary.source = Some(listener.listener_name().to_string());
            }
            Some(summary)
        })
        .collect()
}
