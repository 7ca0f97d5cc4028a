pub mod cache;
pub mod command;
pub mod error;
pub mod experiment;
pub mod extract;
pub mod grid;
pub mod jobs;
pub mod score;

pub use cache::{ArtifactLayout, BuildBackend, BuildIndex, BuildInfo, CachedBuild, RevisionCache};
pub use command::{CommandContext, CommandTemplate, Token};
pub use error::{BuildError, ConfigurationError, CoreError, ParseError};
pub use experiment::{ExperimentWriter, FetchSummary};
pub use extract::{Cardinality, MetricExtractor, ParseReport, Rule, RuleSpec};
pub use grid::{GridBuilder, GridSettings, Run};
pub use jobs::{JobLimits, MailPolicy};
pub use score::{RewardSnapshot, ScoreNormalizer, score_all};

pub mod prelude {
    pub use crate::cache::{BuildBackend, CachedBuild, RevisionCache};
    pub use crate::error::{BuildError, ConfigurationError, CoreError};
    pub use crate::experiment::ExperimentWriter;
    pub use crate::extract::MetricExtractor;
    pub use crate::grid::{GridBuilder, GridSettings, Run};
    pub use crate::jobs::JobLimits;
    pub use crate::score::ScoreNormalizer;
}
