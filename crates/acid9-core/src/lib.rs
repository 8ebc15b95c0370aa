//! acid9-core: Step decisions for the ACID-9 interference sequencer

pub mod config;
mod error;
pub mod euclidean;
pub mod expression;
pub mod gear;
pub mod interference;
pub mod logic;
pub mod scale;
pub mod sequencer;

pub use config::{
    EuclidConfig, ExpressionBlend, ExpressionConfig, InterferenceConfig, LogicConfig, LogicRoute,
    SequencerConfig,
};
pub use error::{Acid9Error, Result};
pub use euclidean::{Distribution, bjorklund, legacy_distribution};
pub use expression::{ExpressionEngine, ExpressionSettings, ForceMode};
pub use gear::{GearBuffer, GearKind, GearSnapshot, MAX_STEPS};
pub use interference::{GEAR_B_LENGTHS, InterferenceEngine, InterferenceSnapshot};
pub use logic::{LogicContext, LogicEvaluator, LogicMode};
pub use scale::{ScaleMask, ScaleMode, quantize};
pub use sequencer::{Acid9Sequencer, SequencerState, StepOutput};
