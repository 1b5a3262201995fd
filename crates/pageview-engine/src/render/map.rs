//! Map view.

use serde::Serialize;

use pageview_core::value::value_number;
use pageview_core::{MapViewConfig, Record, RecordId};

use super::{LabelledValue, Renderer};
use crate::format::FormattedValue;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapRender {
    pub markers: Vec<MapMarker>,
    /// Records with missing or out-of-range coordinates.
    pub unplotted: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapMarker {
    pub id: RecordId,
    pub title: FormattedValue,
    pub latitude: f64,
    pub longitude: f64,
    pub popup: Vec<LabelledValue>,
}

pub(super) fn render(
    renderer: &Renderer<'_>,
    config: &MapViewConfig,
    records: &[Record],
) -> MapRender {
    let mut markers = Vec::new();
    let mut unplotted = 0;

    for record in records {
        let latitude = record
            .get(&config.latitude_field)
            .and_then(value_number)
            .filter(|lat| (-90.0..=90.0).contains(lat));
        let longitude = record
            .get(&config.longitude_field)
            .and_then(value_number)
            .filter(|lng| (-180.0..=180.0).contains(lng));

        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => markers.push(MapMarker {
                id: record.id().clone(),
                title: renderer.text(record, &config.title_field),
                latitude,
                longitude,
                popup: renderer.labelled(record, &config.popup_fields),
            }),
            _ => unplotted += 1,
        }
    }

    MapRender { markers, unplotted }
}
