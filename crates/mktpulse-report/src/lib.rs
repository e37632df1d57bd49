//! Report assembly, narrative generation, delivery and sheet recording.

pub mod assemble;
pub mod dispatch;
pub mod narrative;
pub mod recorder;
pub mod run;

pub use assemble::{assemble, rank_entries, Field, PercentChange, ReportContext, SocialLine};
pub use dispatch::{DeliveryError, LarkDispatcher};
pub use narrative::{
    build_prompt, finalize, missing_sections, sanitize, GeminiClient, GenerationError,
    NarrativeGenerator, TextGenerator,
};
pub use recorder::{RecordError, SheetRecorder};
pub use run::{
    execute_record, execute_report, run_record, run_report, PipelineError, RecordOutcome,
    ReportOutcome,
};
