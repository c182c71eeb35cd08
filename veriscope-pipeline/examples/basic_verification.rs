//! Basic example: verify a declared "Home" profile against a shop-looking call

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use veriscope_core::{DeclaredProfile, Detection, Frame, Region, Result};
use veriscope_pipeline::perception::{EnvironmentRules, PerceptionBackend, RuleAugmentedBackend};
use veriscope_pipeline::source::ScriptedSource;
use veriscope_pipeline::{PipelineConfig, VerificationSession};

/// Stand-in detector replaying what a real model would see on a shop background
struct ShopSceneBackend;

#[async_trait]
impl PerceptionBackend for ShopSceneBackend {
    async fn classify(&self, _frame: &Frame) -> Result<Vec<Detection>> {
        Ok(vec![
            Detection::object("shelves", 0.91, Some(Region::new(40.0, 60.0, 220.0, 300.0))),
            Detection::object("shelves", 0.88, Some(Region::new(300.0, 60.0, 220.0, 300.0))),
            Detection::object("fridge", 0.84, Some(Region::new(540.0, 80.0, 90.0, 260.0))),
            Detection::object(
                "counter_table",
                0.77,
                Some(Region::new(120.0, 320.0, 260.0, 120.0)),
            ),
        ])
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // The customer claims a home environment with two fridges and a sofa
    let profile = DeclaredProfile {
        environment: Some("Home".to_string()),
        objects: BTreeMap::from([("fridge".to_string(), 2), ("sofa".to_string(), 1)]),
    };

    // No dedicated environment classifier here: the rule table synthesizes
    // environment evidence from the object detections
    let backend = Arc::new(RuleAugmentedBackend::new(
        ShopSceneBackend,
        EnvironmentRules::default(),
    ));
    let source = ScriptedSource::evenly_spaced(20, 250, 0.9);

    let mut session = VerificationSession::new(profile, PipelineConfig::default())?;
    let report = session.run(source, backend).await;

    println!("{}", report.to_json()?);
    println!("verdict: {} (score {:.2})", report.risk.verdict, report.risk.score);
    Ok(())
}
