use crate::layout::{LayoutSession, PassReport, ScoreBreakdown};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDump {
    pub spacing: f64,
    pub passes_run: usize,
    pub passes: Vec<PassReport>,
    pub labels: Vec<LabelDump>,
    pub score: Option<ScoreDump>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelDump {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub anchor_x: f64,
    pub anchor_y: f64,
    pub z: f64,
    pub leash: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ScoreDump {
    pub total: f64,
    pub clashes: usize,
    pub breakdown: ScoreBreakdown,
}

impl SessionDump {
    pub fn from_session(session: &LayoutSession) -> Self {
        let labels = session
            .labels()
            .iter()
            .map(|label| LabelDump {
                id: label.id.to_string(),
                x: label.position.x,
                y: label.position.y,
                anchor_x: label.anchor.x,
                anchor_y: label.anchor.y,
                z: label.z,
                leash: label.leash(),
                category: label.category.clone(),
            })
            .collect();

        // An empty batch has no score.
        let score = session.score().ok().map(|score| ScoreDump {
            total: score.total,
            clashes: score.clashes,
            breakdown: score.breakdown,
        });

        SessionDump {
            spacing: session.spacing(),
            passes_run: session.pass_index(),
            passes: session.reports().to_vec(),
            labels,
            score,
        }
    }
}

pub fn write_session_dump(path: &Path, session: &LayoutSession) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = SessionDump::from_session(session);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptimizerConfig;
    use crate::geometry::Point2D;
    use crate::layout::Label;

    #[test]
    fn dump_carries_positions_and_reports() {
        let mut session = LayoutSession::new(OptimizerConfig {
            seed: Some(3),
            ..Default::default()
        })
        .unwrap();
        session
            .load(vec![
                Label::new("a", Point2D::ZERO, Point2D::new(0.2, 0.0)).with_category("Door"),
                Label::new("b", Point2D::ZERO, Point2D::new(-0.2, 0.0)),
            ])
            .unwrap();
        session.run_pass().unwrap();

        let dump = SessionDump::from_session(&session);
        assert_eq!(dump.passes_run, 1);
        assert_eq!(dump.labels.len(), 2);
        assert!(dump.score.is_some());

        let json = serde_json::to_value(&dump).unwrap();
        assert_eq!(json["passes"][0]["pass"], "analyze");
        assert_eq!(json["labels"][0]["category"], "Door");
        assert!(json["labels"][1].get("category").is_none());
        assert!(json["labels"][0]["anchorX"].is_number());
    }
}
