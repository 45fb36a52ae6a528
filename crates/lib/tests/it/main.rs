/*! Integration tests for Concord.
 *
 * This test suite is organized as a single integration test binary
 * following the pattern described by matklad in
 * https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html
 *
 * The module structure mirrors the main library structure:
 * - coordinator: Bootstrap, error delivery, bind handling and the shared instance
 * - user: Registry contention and the login/logout lifecycle
 * - metadata: Persistence of user records across coordinator restarts
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("concord=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

mod helpers;
mod metadata;
