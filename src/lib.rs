pub mod backup;
pub mod commands;
pub mod doctor;
pub mod foundry;
pub mod fs_utils;
pub mod interactive;
pub mod logging;
pub mod paths;
pub mod store;
pub mod ui;
pub mod vars;

#[cfg(test)]
pub mod test_utils;
