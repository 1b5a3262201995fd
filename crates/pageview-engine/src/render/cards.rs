//! Card-based views: list, grid and kanban.

use serde::Serialize;

use pageview_core::value::value_text;
use pageview_core::{
    FieldPath, GridViewConfig, KanbanViewConfig, ListViewConfig, Record, ToolbarState,
};

use super::{Card, Renderer};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRender {
    pub items: Vec<Card>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRender {
    /// Cards per row, passed through as a layout hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<u8>,
    pub cards: Vec<Card>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KanbanRender {
    /// Declared lanes in declared order.
    pub lanes: Vec<KanbanLane>,
    /// Records whose status matches no declared lane.
    pub unmapped: KanbanLane,
}

impl KanbanRender {
    /// Cards across all lanes, the unmapped lane included.
    pub fn total(&self) -> usize {
        self.lanes.iter().map(|l| l.cards.len()).sum::<usize>() + self.unmapped.cards.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KanbanLane {
    /// `None` for the unmapped lane.
    pub id: Option<String>,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub cards: Vec<Card>,
}

struct CardSlots<'a> {
    title: &'a FieldPath,
    subtitle: Option<&'a FieldPath>,
    badge: Option<&'a FieldPath>,
    image: Option<&'a FieldPath>,
    fields: &'a [FieldPath],
}

fn card(
    renderer: &Renderer<'_>,
    slots: &CardSlots<'_>,
    toolbar: &ToolbarState,
    record: &Record,
) -> Card {
    Card {
        id: record.id().clone(),
        selected: toolbar.selected.contains(record.id()),
        title: renderer.text(record, slots.title),
        subtitle: slots.subtitle.map(|f| renderer.cell(record, f)),
        badge: slots.badge.map(|f| renderer.cell(record, f)),
        image: slots
            .image
            .and_then(|f| record.get(f))
            .and_then(value_text),
        fields: renderer.labelled(record, slots.fields),
    }
}

pub(super) fn render_list(
    renderer: &Renderer<'_>,
    config: &ListViewConfig,
    toolbar: &ToolbarState,
    records: &[Record],
) -> ListRender {
    let slots = CardSlots {
        title: &config.title_field,
        subtitle: config.subtitle_field.as_ref(),
        badge: config.badge_field.as_ref(),
        image: None,
        fields: &config.meta_fields,
    };
    ListRender {
        items: records
            .iter()
            .map(|r| card(renderer, &slots, toolbar, r))
            .collect(),
    }
}

pub(super) fn render_grid(
    renderer: &Renderer<'_>,
    config: &GridViewConfig,
    toolbar: &ToolbarState,
    records: &[Record],
) -> GridRender {
    let slots = CardSlots {
        title: &config.title_field,
        subtitle: config.subtitle_field.as_ref(),
        badge: config.badge_field.as_ref(),
        image: config.image_field.as_ref(),
        fields: &config.card_fields,
    };
    GridRender {
        columns: config.columns,
        cards: records
            .iter()
            .map(|r| card(renderer, &slots, toolbar, r))
            .collect(),
    }
}

pub(super) fn render_kanban(
    renderer: &Renderer<'_>,
    config: &KanbanViewConfig,
    toolbar: &ToolbarState,
    records: &[Record],
) -> KanbanRender {
    let slots = CardSlots {
        title: &config.title_field,
        subtitle: config.subtitle_field.as_ref(),
        badge: None,
        image: None,
        fields: &config.card_fields,
    };

    let mut lanes: Vec<KanbanLane> = config
        .columns
        .iter()
        .map(|c| KanbanLane {
            id: Some(c.id.clone()),
            label: c.label.clone(),
            color: c.color.clone(),
            cards: Vec::new(),
        })
        .collect();
    let mut unmapped = KanbanLane {
        id: None,
        label: "Unmapped".to_string(),
        color: None,
        cards: Vec::new(),
    };

    for record in records {
        let status = record.get(&config.status_field).and_then(value_text);
        let lane = status
            .as_deref()
            .and_then(|s| lanes.iter_mut().find(|l| l.id.as_deref() == Some(s)));
        let item = card(renderer, &slots, toolbar, record);
        match lane {
            Some(lane) => lane.cards.push(item),
            None => unmapped.cards.push(item),
        }
    }

    KanbanRender { lanes, unmapped }
}
