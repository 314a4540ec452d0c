pub mod ledger_store;
pub mod metagraph_file;
pub mod prediction_store;
pub mod weight_journal;

pub use ledger_store::FileLedgerStore;
pub use metagraph_file::TomlMetagraphSource;
pub use prediction_store::FilePredictionStore;
pub use weight_journal::{JournalWeightCommitter, WeightCommitment};
