//! UDP notifier for join/exit announcements.
//!
//! Each connection handler owns one `Notifier` for its whole session and
//! drops it when the session ends. The notifier holds an IPv4 socket and,
//! when the host supports it, an IPv6 socket. A broadcast sends the same
//! datagram to every member of a roster snapshot, one member at a time; a
//! failed send is logged and does not stop the remaining sends.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use memd_core::Member;
use memd_protocol::Notification;
use tokio::net::{lookup_host, UdpSocket};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Upper bound for resolving and sending to one member
const SEND_TIMEOUT: Duration = Duration::from_secs(2);

/// Outcome counts of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Errors from sending a single notification datagram.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to resolve {target}: {error}")]
    Resolve { target: String, error: String },

    #[error("No usable address for {target}")]
    NoAddress { target: String },

    #[error("Failed to send to {target}: {error}")]
    Send { target: SocketAddr, error: String },

    #[error("No IPv6 socket available to reach {target}")]
    NoIpv6Socket { target: SocketAddr },

    #[error("Timed out notifying {target}")]
    Timeout { target: String },
}

/// Sends notification datagrams on behalf of one connection.
pub struct Notifier {
    v4: UdpSocket,
    /// Absent on hosts without IPv6
    v6: Option<UdpSocket>,
    connection: u64,
}

impl Notifier {
    /// Binds fresh UDP sockets on ephemeral ports.
    ///
    /// # Errors
    ///
    /// Fails only if the IPv4 socket cannot be bound. An unavailable IPv6
    /// stack is logged and leaves IPv6-only members unreachable.
    pub async fn bind(connection: u64) -> io::Result<Self> {
        let v4 = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        let v6 = match UdpSocket::bind((Ipv6Addr::UNSPECIFIED, 0)).await {
            Ok(socket) => Some(socket),
            Err(e) => {
                debug!(connection, error = %e, "IPv6 notification socket unavailable");
                None
            }
        };
        Ok(Self { v4, v6, connection })
    }

    /// Sends `notification` to every member in `roster`.
    pub async fn broadcast(&self, roster: &[Member], notification: &Notification) -> BroadcastReport {
        let payload = notification.to_datagram();
        let mut report = BroadcastReport::default();

        for member in roster {
            match self.send_to_member(&payload, member).await {
                Ok(target) => {
                    debug!(
                        connection = self.connection,
                        screen_name = %member.screen_name(),
                        target = %target,
                        notification = %notification,
                        "Notification sent"
                    );
                    report.delivered += 1;
                }
                Err(e) => {
                    warn!(
                        connection = self.connection,
                        screen_name = %member.screen_name(),
                        error = %e,
                        "Failed to notify member"
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }

    async fn send_to_member(&self, payload: &[u8], member: &Member) -> Result<SocketAddr, NotifyError> {
        let (host, port) = member.endpoint();
        let label = format!("{host}:{port}");

        match timeout(SEND_TIMEOUT, self.resolve_and_send(payload, host, port, &label)).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout { target: label }),
        }
    }

    async fn resolve_and_send(
        &self,
        payload: &[u8],
        host: &str,
        port: u16,
        label: &str,
    ) -> Result<SocketAddr, NotifyError> {
        let resolved: Vec<SocketAddr> = lookup_host((host, port))
            .await
            .map_err(|e| NotifyError::Resolve {
                target: label.to_string(),
                error: e.to_string(),
            })?
            .collect();

        let target = select_target(&resolved).ok_or_else(|| NotifyError::NoAddress {
            target: label.to_string(),
        })?;

        self.send_datagram(payload, target).await?;
        Ok(target)
    }

    /// Sends one datagram from the socket matching the target's family.
    async fn send_datagram(&self, payload: &[u8], target: SocketAddr) -> Result<(), NotifyError> {
        let socket = match target {
            SocketAddr::V4(_) => &self.v4,
            SocketAddr::V6(_) => self
                .v6
                .as_ref()
                .ok_or(NotifyError::NoIpv6Socket { target })?,
        };

        socket
            .send_to(payload, target)
            .await
            .map_err(|e| NotifyError::Send {
                target,
                error: e.to_string(),
            })?;

        Ok(())
    }
}

/// Picks the address to notify: the first IPv4 result, else the first
/// result of any family.
fn select_target(resolved: &[SocketAddr]) -> Option<SocketAddr> {
    resolved
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| resolved.first())
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use memd_core::ScreenName;

    async fn recv_line(socket: &UdpSocket) -> String {
        let mut buf = [0u8; 1024];
        let (n, _) = timeout(Duration::from_secs(5), socket.recv_from(&mut buf))
            .await
            .expect("datagram within timeout")
            .unwrap();
        String::from_utf8_lossy(&buf[..n]).into_owned()
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_member() {
        let a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let b = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let roster = vec![
            Member::new(ScreenName::new("alice").unwrap(), "127.0.0.1", a.local_addr().unwrap().port()).unwrap(),
            Member::new(ScreenName::new("bob").unwrap(), "127.0.0.1", b.local_addr().unwrap().port()).unwrap(),
        ];

        let notifier = Notifier::bind(1).await.unwrap();
        let report = notifier
            .broadcast(&roster, &Notification::exit(ScreenName::new("alice").unwrap()))
            .await;

        assert_eq!(report, BroadcastReport { delivered: 2, failed: 0 });
        assert_eq!(recv_line(&a).await, "EXIT alice\n");
        assert_eq!(recv_line(&b).await, "EXIT alice\n");
    }

    #[tokio::test]
    async fn test_unresolvable_member_does_not_stop_broadcast() {
        let ok = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let roster = vec![
            Member::new(ScreenName::new("ghost").unwrap(), "host.invalid", 9).unwrap(),
            Member::new(ScreenName::new("carol").unwrap(), "127.0.0.1", ok.local_addr().unwrap().port()).unwrap(),
        ];

        let notifier = Notifier::bind(2).await.unwrap();
        let join = Notification::join(&roster[1]);
        let report = notifier.broadcast(&roster, &join).await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.delivered, 1);
        assert!(recv_line(&ok).await.starts_with("JOIN carol 127.0.0.1 "));
    }

    #[test]
    fn test_select_target_prefers_ipv4() {
        let v4: SocketAddr = "127.0.0.1:9001".parse().unwrap();
        let v6: SocketAddr = "[::1]:9001".parse().unwrap();

        assert_eq!(select_target(&[v6, v4]), Some(v4));
        assert_eq!(select_target(&[v6]), Some(v6));
        assert_eq!(select_target(&[]), None);
    }

    #[tokio::test]
    async fn test_ipv6_target_is_delivered() {
        // Hosts without IPv6 loopback have nothing to deliver to
        let Ok(listener) = UdpSocket::bind("[::1]:0").await else {
            return;
        };
        let target = listener.local_addr().unwrap();

        let notifier = Notifier::bind(3).await.unwrap();
        if notifier.v6.is_none() {
            return;
        }

        notifier.send_datagram(b"EXIT alice\n", target).await.unwrap();
        assert_eq!(recv_line(&listener).await, "EXIT alice\n");
    }

    #[test]
    fn test_notify_error_display() {
        let err = NotifyError::NoAddress {
            target: "::1:9001".to_string(),
        };
        assert!(err.to_string().contains("::1:9001"));
    }
}
