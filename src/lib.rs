// sparkify-dwh - Redshift provisioning and warehouse loading
//
// Two binaries share this library:
// - sparkify-dwh <create|check|clean>: IAM role + cluster lifecycle, and
//   write-back of the role ARN and endpoint into the config file
// - sparkify-etl: COPY into staging tables, then INSERT into the star schema
//
// Every mode runs its provider calls and SQL statements one at a time on a
// current-thread runtime.

mod init;

pub mod loader;
pub mod provision;

pub use init::init_tracing;
pub use sparkify_dwh_config as config;

/// Build the current-thread runtime both binaries run on.
pub fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}
