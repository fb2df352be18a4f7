pub mod cooldown;
pub mod reconciler;
pub mod sheets;

pub use cooldown::CooldownLock;
pub use reconciler::{Reconciler, SyncReport};
pub use sheets::{HttpSpreadsheetClient, SheetsError, SpreadsheetClient, StaticSheet};
