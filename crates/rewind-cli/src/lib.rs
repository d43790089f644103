// rewind CLI library
// Script-driven ledger demo built on rewind-undo-redo

pub mod error;
pub mod ledger;
pub mod router;
pub mod script;
pub mod session;

pub use error::{CliError, CliResult};
pub use ledger::Ledger;
pub use router::{run, Cli};
pub use script::{parse_script, ScriptLine, Statement};
pub use session::{Session, SessionSummary};
