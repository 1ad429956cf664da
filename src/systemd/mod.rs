// Systemd integration module

pub mod client;
pub mod control;
pub mod models;


pub use client::{parse_unit_files, parse_units, ServiceManagerClient, SystemctlClient, UnitFileStates};
pub use control::{validate_unit_name, ActionExecutor, ActionRunner, ActionVerb, SystemctlActions};
pub use models::{
    ActiveState, EnabledState, ListUnitFilesRow, ListUnitsRow, QueryKind, Scope, UnitKey, UnitRecord,
    TRANSITIONAL_SUBSTATES,
};

#[cfg(test)]
pub use client::MockServiceManagerClient;
#[cfg(test)]
pub use control::MockActionRunner;
