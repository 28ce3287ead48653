//! Bounded in-pod connectivity probe
//!
//! Executes a 5-second connection attempt from inside a fixture pod. The
//! probe never retries; retry policy, if any, belongs to the calling check.

use std::time::Duration;

use tracing::warn;

use crate::cluster::{ClusterError, ExecOutput};
use crate::fixture::Fixture;

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// `host:port`, bracketing IPv6 literals.
pub fn join_host_port(host: &str, port: i32) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// The agnhost command line for a bounded connection attempt.
pub fn connect_command(host: &str, port: i32) -> Vec<String> {
    vec![
        "/agnhost".to_string(),
        "connect".to_string(),
        join_host_port(host, port),
        format!("--timeout={}s", PROBE_TIMEOUT.as_secs()),
    ]
}

/// Attempt a connection to `host:port` from inside the named container.
///
/// On failure the command line and captured stderr are logged for
/// diagnostics before the error is returned to the caller.
pub async fn probe(
    fixture: &Fixture,
    pod: &str,
    container: &str,
    host: &str,
    port: i32,
) -> Result<ExecOutput, ClusterError> {
    let command = connect_command(host, port);
    match fixture
        .cluster
        .exec(&fixture.namespace, pod, container, &command)
        .await
    {
        Ok(output) => Ok(output),
        Err(err) => {
            warn!(command = %command.join(" "), error = %err, "connection probe failed");
            if let ClusterError::Exec { stderr, .. } = &err {
                if !stderr.is_empty() {
                    warn!(%stderr, "probe stderr");
                }
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_command_is_bounded() {
        let cmd = connect_command("10.0.0.7", 80);
        assert_eq!(cmd, vec!["/agnhost", "connect", "10.0.0.7:80", "--timeout=5s"]);
    }

    #[test]
    fn ipv6_hosts_are_bracketed() {
        assert_eq!(join_host_port("fd00::1", 80), "[fd00::1]:80");
        assert_eq!(join_host_port("echo-same-node", 80), "echo-same-node:80");
    }
}
