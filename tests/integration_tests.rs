use portlab::{
    Direction, LabConfig, NumericStyle, PortConfig, PortSession, PortStatus, ResponseMode,
    SessionRegistry, VirtualBackend,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(1);

/// Integration tests for the portlab library
#[cfg(test)]
mod integration_tests {
    use super::*;

    fn registry_on(backend: &VirtualBackend) -> SessionRegistry {
        SessionRegistry::new(Arc::new(backend.clone()))
    }

    async fn open_listening(registry: &mut SessionRegistry, name: &str) {
        let session = registry.try_get_mut(name).unwrap();
        session.set_listen(true).await;
        assert!(session.open().await);
    }

    #[tokio::test]
    async fn test_discover_open_receive_and_log() {
        let backend = VirtualBackend::new(["COM1", "COM2"]);
        let mut registry = registry_on(&backend);

        registry.reconcile().await.unwrap();
        assert_eq!(registry.port_names(), vec!["COM1", "COM2"]);

        open_listening(&mut registry, "COM1").await;
        let mut received = registry
            .try_get("COM1")
            .unwrap()
            .subscribe_received()
            .await;

        backend.inject("COM1", b"hello from device");
        let event = timeout(RECV_TIMEOUT, received.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.source, "COM1");
        assert_eq!(event.direction, Direction::Inbound);
        assert_eq!(event.entry, "hello from device");

        // The consumer-side log block renders from the structured event
        let block = event.format_block();
        assert!(block.contains("COM1:IN"));
        assert!(block.contains("-----------------\nhello from device\n\n"));
    }

    #[tokio::test]
    async fn test_broadcast_parse_and_send_reaches_every_port() {
        let backend = VirtualBackend::new(["COM1", "COM2", "COM3"]);
        let mut registry = registry_on(&backend);
        registry.reconcile().await.unwrap();

        open_listening(&mut registry, "COM1").await;
        open_listening(&mut registry, "COM2").await;
        // COM3 stays closed and silently ignores the broadcast

        registry.parse_and_send("1A,2B;3C", NumericStyle::Hex).await;

        assert_eq!(backend.written("COM1"), vec![0x1A, 0x2B, 0x3C]);
        assert_eq!(backend.written("COM2"), vec![0x1A, 0x2B, 0x3C]);
        assert!(backend.written("COM3").is_empty());
        assert_eq!(
            registry.try_get("COM3").unwrap().status().await,
            PortStatus::Stopped
        );
    }

    #[tokio::test]
    async fn test_hot_unplug_then_rediscovery() {
        let backend = VirtualBackend::new(["COM1", "COM2"]);
        let mut registry = registry_on(&backend);
        registry.reconcile().await.unwrap();
        open_listening(&mut registry, "COM2").await;

        // Device on COM2 disappears
        backend.set_ports(["COM1"]);
        registry.reconcile().await.unwrap();
        assert_eq!(registry.port_names(), vec!["COM1"]);
        assert!(!backend.is_open("COM2"));

        // It comes back; the new session starts from scratch
        backend.set_ports(["COM1", "COM2"]);
        registry.reconcile().await.unwrap();
        let revived = registry.try_get("COM2").unwrap();
        assert_eq!(revived.status().await, PortStatus::Stopped);
        assert!(!revived.config().await.listen);
    }

    #[tokio::test]
    async fn test_status_stream_tracks_full_lifecycle() {
        let backend = VirtualBackend::new(["COM1"]);
        let mut registry = registry_on(&backend);
        registry.reconcile().await.unwrap();

        let mut status = registry.try_get("COM1").unwrap().subscribe_status().await;
        registry.try_get_mut("COM1").unwrap().set_listen(true).await;

        assert!(registry.try_get_mut("COM1").unwrap().open().await);
        backend.fail_write("COM1");
        registry.send_all_text("doomed").await;
        registry.close_all().await;

        let seen: Vec<PortStatus> = {
            let mut seen = Vec::new();
            while let Ok(Some(event)) = timeout(RECV_TIMEOUT, status.recv()).await {
                seen.push(event.status);
                if seen.len() == 3 {
                    break;
                }
            }
            seen
        };
        assert_eq!(
            seen,
            vec![PortStatus::Running, PortStatus::Error, PortStatus::Stopped]
        );
    }

    #[tokio::test]
    async fn test_bytes_response_mode_round_trip() {
        let backend = VirtualBackend::new(["COM1"]);
        let mut registry = registry_on(&backend);
        registry.reconcile().await.unwrap();

        registry
            .try_get_mut("COM1")
            .unwrap()
            .set_response_mode(ResponseMode::Bytes)
            .await;
        open_listening(&mut registry, "COM1").await;

        let session = registry.try_get("COM1").unwrap();
        let mut received = session.subscribe_received().await;
        let mut sent = session.subscribe_sent().await;

        registry.send_all_bytes(&[0x4F, 0x03]).await;
        let out = timeout(RECV_TIMEOUT, sent.recv()).await.unwrap().unwrap();
        assert_eq!(out.entry, "Bytes: 4F 03");

        backend.inject("COM1", &[0x4F, 0x3A, 0x01]);
        let inbound = timeout(RECV_TIMEOUT, received.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(inbound.entry, "4F-3A-01");
    }

    #[tokio::test]
    async fn test_config_file_drives_registry_defaults() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "poll_interval_ms = 5\n\n[defaults]\nbaud_rate = 115200\nlisten = true\nresponse_mode = \"bytes\""
        )
        .unwrap();
        let config = LabConfig::load_from_path(file.path()).unwrap();

        let backend = VirtualBackend::new(["COM1"]);
        let mut registry =
            SessionRegistry::with_defaults(Arc::new(backend.clone()), config.defaults.clone());
        registry.set_poll_interval(config.poll_interval());
        registry.reconcile().await.unwrap();

        assert_eq!(registry.open_all().await, 1);
        let applied = backend.applied_config("COM1").unwrap();
        assert_eq!(applied.baud_rate, 115200);
        assert_eq!(applied.response_mode, ResponseMode::Bytes);
    }

    #[tokio::test]
    async fn test_shutdown_releases_everything() {
        let backend = VirtualBackend::new(["COM1", "COM2"]);
        let mut registry = registry_on(&backend);
        registry.reconcile().await.unwrap();
        open_listening(&mut registry, "COM1").await;
        open_listening(&mut registry, "COM2").await;

        registry.shutdown().await;
        assert!(registry.is_empty());
        assert!(!backend.is_open("COM1"));
        assert!(!backend.is_open("COM2"));

        // The freed ports can be opened directly again
        let session = PortSession::with_config(
            "COM1",
            PortConfig {
                listen: true,
                ..PortConfig::default()
            },
            Arc::new(backend.clone()),
        );
        let mut session = session.unwrap();
        assert!(session.open().await);
    }
}
