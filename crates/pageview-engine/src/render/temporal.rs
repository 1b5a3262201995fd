//! Calendar, timeline and gantt views.
//!
//! All three place records on a time axis. Records whose start does not
//! parse are left out and counted as unscheduled.

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;

use pageview_core::value::{value_datetime, value_number, value_text};
use pageview_core::{
    CalendarViewConfig, FieldPath, GanttViewConfig, Record, RecordId, TimelineViewConfig,
};

use super::Renderer;
use crate::format::FormattedValue;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporalRender {
    pub spans: Vec<TemporalSpan>,
    pub unscheduled: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporalSpan {
    pub id: RecordId,
    pub title: FormattedValue,
    pub start: NaiveDateTime,
    /// Absent for point events and ends before the start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Completion in percent, clamped to `[0, 100]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<RecordId>,
}

struct Axis<'a> {
    title: &'a FieldPath,
    start: &'a FieldPath,
    end: Option<&'a FieldPath>,
}

fn place<F>(renderer: &Renderer<'_>, axis: &Axis<'_>, records: &[Record], extend: F) -> TemporalRender
where
    F: Fn(&Record, &mut TemporalSpan),
{
    let mut spans = Vec::with_capacity(records.len());
    let mut unscheduled = 0;

    for record in records {
        let Some(start) = record.get(axis.start).and_then(value_datetime) else {
            unscheduled += 1;
            continue;
        };
        let end = axis
            .end
            .and_then(|f| record.get(f))
            .and_then(value_datetime)
            .filter(|end| *end >= start);

        let mut span = TemporalSpan {
            id: record.id().clone(),
            title: renderer.text(record, axis.title),
            start,
            end,
            color: None,
            group: None,
            progress: None,
            dependencies: Vec::new(),
        };
        extend(record, &mut span);
        spans.push(span);
    }

    TemporalRender { spans, unscheduled }
}

pub(super) fn render_calendar(
    renderer: &Renderer<'_>,
    config: &CalendarViewConfig,
    records: &[Record],
) -> TemporalRender {
    let axis = Axis {
        title: &config.title_field,
        start: &config.start_field,
        end: config.end_field.as_ref(),
    };
    place(renderer, &axis, records, |record, span| {
        span.color = config
            .color_field
            .as_ref()
            .and_then(|f| record.get(f))
            .and_then(value_text);
    })
}

pub(super) fn render_timeline(
    renderer: &Renderer<'_>,
    config: &TimelineViewConfig,
    records: &[Record],
) -> TemporalRender {
    let axis = Axis {
        title: &config.title_field,
        start: &config.start_field,
        end: config.end_field.as_ref(),
    };
    place(renderer, &axis, records, |record, span| {
        span.group = config
            .group_field
            .as_ref()
            .and_then(|f| record.get(f))
            .and_then(value_text);
    })
}

pub(super) fn render_gantt(
    renderer: &Renderer<'_>,
    config: &GanttViewConfig,
    records: &[Record],
) -> TemporalRender {
    let axis = Axis {
        title: &config.title_field,
        start: &config.start_field,
        end: Some(&config.end_field),
    };
    place(renderer, &axis, records, |record, span| {
        span.progress = config
            .progress_field
            .as_ref()
            .and_then(|f| record.get(f))
            .and_then(value_number)
            .map(|p| p.clamp(0.0, 100.0));
        span.dependencies = config
            .dependencies_field
            .as_ref()
            .and_then(|f| record.get(f))
            .map(dependency_ids)
            .unwrap_or_default();
    })
}

/// Dependencies as an id array or a comma-separated string.
fn dependency_ids(value: &Value) -> Vec<RecordId> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(value_text)
            .map(RecordId::from)
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(RecordId::from)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{crm_page, crm_records};
    use super::super::RenderTree;
    use super::*;
    use crate::format::FormatRegistry;
    use pageview_core::{QueryDefaults, ToolbarState, ViewType};
    use serde_json::json;

    fn render(view: ViewType) -> TemporalRender {
        let page = crm_page();
        let registry = FormatRegistry::default();
        let mut toolbar = ToolbarState::for_page(&page, &QueryDefaults::default());
        toolbar.active_view = view;
        match Renderer::new(&page, &registry).render(&toolbar, &crm_records()) {
            Ok(RenderTree::Calendar(t) | RenderTree::Timeline(t) | RenderTree::Gantt(t)) => t,
            other => panic!("expected temporal view, got {other:?}"),
        }
    }

    #[test]
    fn test_calendar_counts_unscheduled() {
        let calendar = render(ViewType::Calendar);
        // d3 has "soon", d4 has no date
        assert_eq!(calendar.spans.len(), 2);
        assert_eq!(calendar.unscheduled, 2);
        assert_eq!(calendar.spans[0].start.to_string(), "2024-03-20 00:00:00");
    }

    #[test]
    fn test_timeline_groups() {
        let timeline = render(ViewType::Timeline);
        let groups: Vec<Option<&str>> = timeline.spans.iter().map(|s| s.group.as_deref()).collect();
        assert_eq!(groups, [Some("lead"), Some("won")]);
    }

    #[test]
    fn test_gantt_progress_and_dependencies() {
        let gantt = render(ViewType::Gantt);
        // d3 and d4 have no start date
        assert_eq!(gantt.unscheduled, 2);
        let globex = &gantt.spans[1];
        assert_eq!(globex.progress, Some(100.0));
        assert_eq!(globex.dependencies, vec![RecordId::from("d1")]);
        assert!(globex.end.is_some());
    }

    #[test]
    fn test_dependency_ids_shapes() {
        assert_eq!(
            dependency_ids(&json!("a, b,,c")),
            vec![RecordId::from("a"), RecordId::from("b"), RecordId::from("c")]
        );
        assert_eq!(dependency_ids(&json!([1, 2])).len(), 2);
        assert!(dependency_ids(&json!(null)).is_empty());
    }
}
