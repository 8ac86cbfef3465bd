#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
        time::Duration,
    };

    use cslights_master::*;
    use serde_json::{json, Value};
    use tokio::{
        io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines},
        net::{
            tcp::{OwnedReadHalf, OwnedWriteHalf},
            TcpListener,
        },
        sync::oneshot,
        time::timeout,
    };

    const HOME_MODEL: &str = r#"{"rpl-type":"home-model","accessories":[{"accessory":{"id":5,"name":"","type":1},"services":[{"service":{"id":2,"role":1,"type":2},"modules":[{"mac":"aa","sn":"W1","name":"drv","type":2,"index":0}]}]},{"accessory":{"id":4,"name":"Pump","type":2},"services":[]}]}"#;
    const MODULE_LIST: &str = r#"{"rpl-type":"module-list","modules":[{"mac":"aa","sn":"W1","name":"drv","type":2,"index":0,"lbusCount":2}]}"#;
    const LIGHT_ON: &str = r#"{"rpl-type":"acc-state","acc-id":5,"valid":true,"brightness":0.5,"on":true}"#;

    /// The controller side of a connection.
    struct Peer {
        lines: Lines<BufReader<OwnedReadHalf>>,
        write: OwnedWriteHalf,
    }

    impl Peer {
        async fn accept(listener: &TcpListener) -> Self {
            let (stream, _) = timeout(Duration::from_secs(5), listener.accept())
                .await
                .expect("no connection from master")
                .unwrap();
            let (read, write) = stream.into_split();
            Self {
                lines: BufReader::new(read).lines(),
                write,
            }
        }

        async fn command(&mut self) -> Value {
            let line = timeout(Duration::from_secs(5), self.lines.next_line())
                .await
                .expect("no command from master")
                .unwrap()
                .expect("connection closed");
            serde_json::from_str(&line).unwrap()
        }

        async fn send(&mut self, line: &str) {
            self.write.write_all(line.as_bytes()).await.unwrap();
            self.write.write_all(b"\n").await.unwrap();
        }

        /// Answers the two discovery requests.
        async fn discovery(&mut self) {
            assert_eq!(self.command().await, json!({"command": "GetHomeModel"}));
            self.send(HOME_MODEL).await;
            assert_eq!(self.command().await, json!({"command": "GetModules"}));
            self.send(MODULE_LIST).await;
        }
    }

    async fn listener() -> (TcpListener, MasterConfig) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let config = MasterConfig::new("127.0.0.1")
            .port(port)
            .connect_timeout(Duration::from_secs(1))
            .discovery_timeout(Duration::from_secs(2))
            .reconnect_delay(Duration::from_millis(100));
        (listener, config)
    }

    async fn wait_until(what: &str, check: impl Fn() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {}", what);
    }

    #[tokio::test]
    async fn test_setup_discovers_home() {
        let (listener, config) = listener().await;
        let server = tokio::spawn(async move {
            let mut peer = Peer::accept(&listener).await;
            assert_eq!(peer.command().await, json!({"command": "GetHomeModel"}));
            // garbage and unknown replies are skipped
            peer.send("{oops").await;
            peer.send(r#"{"rpl-type":"firmware-info"}"#).await;
            peer.send("").await;
            peer.send(HOME_MODEL).await;
            assert_eq!(peer.command().await, json!({"command": "GetModules"}));
            peer.send(MODULE_LIST).await;
            peer.send(LIGHT_ON).await;
            peer
        });

        let mut master = HomeMaster::new(config);
        assert_eq!(master.phase(), SetupPhase::Disconnected);
        master.setup().await.unwrap();
        assert_eq!(master.phase(), SetupPhase::Ready);
        assert!(master.is_online());
        {
            let registry = master.registry();
            assert_eq!(registry.lights().len(), 1);
            assert_eq!(registry.relays().len(), 1);
            assert_eq!(registry.light_bus_module("W1").unwrap().channel_count(), 2);
        }

        let mut peer = server.await.unwrap();
        wait_until("light 5", || master.is_available(5)).await;
        assert!(!master.is_available(4));
        assert_eq!(
            master.registry().light(5).unwrap().current_brightness(),
            0.5
        );

        assert!(matches!(
            master.setup().await,
            Err(SetupError::AlreadyRunning)
        ));

        master.shutdown().await.unwrap();
        assert_eq!(master.phase(), SetupPhase::Disconnected);
        assert!(!master.is_online());
        assert_eq!(master.registry().device_count(), 0);
        // the controller sees the connection go away
        let closed = timeout(Duration::from_secs(5), peer.lines.next_line())
            .await
            .unwrap();
        assert!(matches!(closed, Ok(None) | Err(_)));
    }

    #[tokio::test]
    async fn test_commands_reach_the_master() {
        let (listener, config) = listener().await;
        let (commands_tx, commands_rx) = oneshot::channel();
        let server = tokio::spawn(async move {
            let mut peer = Peer::accept(&listener).await;
            peer.discovery().await;
            let mut received = Vec::new();
            for _ in 0..4 {
                received.push(peer.command().await);
            }
            let _ = commands_tx.send(received);
            peer
        });

        let mut master = HomeMaster::new(config);
        master.setup().await.unwrap();
        let commands = master.commands().clone();
        commands.request_target_brightness(5, 1.4).await.unwrap();
        commands.request_target_boolean(4, true).await.unwrap();
        commands.request_target_position(3, -0.2).await.unwrap();
        commands.request_state_refresh(5).await.unwrap();

        let received = timeout(Duration::from_secs(5), commands_rx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            received,
            vec![
                json!({"command": "AccSetValue", "acc-id": "5", "evt-type": "set-brightness", "evt-value": 1.0}),
                json!({"command": "AccSetValue", "acc-id": "4", "evt-type": "set-bool", "evt-value": true}),
                json!({"command": "AccSetValue", "acc-id": "3", "evt-type": "set-position", "evt-value": 0.0}),
                json!({"command": "GetAccState", "acc-id": "5"}),
            ]
        );
        {
            let registry = master.registry();
            assert_eq!(registry.light(5).unwrap().target_brightness(), 1.0);
            assert!(registry.relay(4).unwrap().target_state());
        }

        let _peer = server.await.unwrap();
        master.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_commands_fail_without_connection() {
        let master = HomeMaster::new(MasterConfig::new("127.0.0.1"));
        assert!(!master.is_online());
        assert!(matches!(
            master.commands().request_state_refresh(1).await,
            Err(ConnectionError::NotConnected)
        ));
        assert!(matches!(
            master.commands().request_target_boolean(1, true).await,
            Err(ConnectionError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let (listener, config) = listener().await;
        drop(listener);
        let mut master = HomeMaster::new(config);
        let result = master.setup().await;
        assert!(matches!(
            result,
            Err(SetupError::Connection(ConnectionError::Refused { .. }))
        ));
        assert_eq!(master.phase(), SetupPhase::Failed);
        assert!(!master.is_online());
        master.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_discovery_timeout() {
        let (listener, config) = listener().await;
        let config = config.discovery_timeout(Duration::from_millis(200));
        let server = tokio::spawn(async move {
            let mut peer = Peer::accept(&listener).await;
            assert_eq!(peer.command().await, json!({"command": "GetHomeModel"}));
            peer
        });

        let mut master = HomeMaster::new(config);
        let result = master.setup().await;
        assert!(matches!(
            result,
            Err(SetupError::Timeout(SetupStep::HomeModel))
        ));
        assert_eq!(master.phase(), SetupPhase::Failed);

        // a late reply is still applied but doesn't revive the setup
        let mut peer = server.await.unwrap();
        peer.send(HOME_MODEL).await;
        wait_until("home model", || master.registry().device_count() == 2).await;
        assert_eq!(master.phase(), SetupPhase::Failed);

        master.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_module_list_timeout() {
        let (listener, config) = listener().await;
        let config = config.discovery_timeout(Duration::from_millis(200));
        let server = tokio::spawn(async move {
            let mut peer = Peer::accept(&listener).await;
            assert_eq!(peer.command().await, json!({"command": "GetHomeModel"}));
            peer.send(HOME_MODEL).await;
            assert_eq!(peer.command().await, json!({"command": "GetModules"}));
            peer
        });

        let mut master = HomeMaster::new(config);
        let result = master.setup().await;
        assert!(matches!(
            result,
            Err(SetupError::Timeout(SetupStep::ModuleList))
        ));
        let _peer = server.await.unwrap();
        master.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reconnect_after_connection_loss() {
        let (listener, config) = listener().await;
        let (drop_tx, drop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            let mut peer = Peer::accept(&listener).await;
            peer.discovery().await;
            peer.send(LIGHT_ON).await;
            drop_rx.await.unwrap();
            drop(peer);

            let mut peer = Peer::accept(&listener).await;
            // every accessory of the home model is asked for its state
            assert_eq!(
                peer.command().await,
                json!({"command": "GetAccState", "acc-id": "5"})
            );
            assert_eq!(
                peer.command().await,
                json!({"command": "GetAccState", "acc-id": "4"})
            );
            peer.send(LIGHT_ON).await;
            peer
        });

        let mut master = HomeMaster::new(config);
        master.setup().await.unwrap();
        wait_until("light 5", || master.is_available(5)).await;

        // observers read the device from within the callback
        let seen = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let callback: Callback = {
            let registry = master.registry_handle();
            let seen = seen.clone();
            let calls = calls.clone();
            Arc::new(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                let online = registry.lock().light(5).map(|light| light.online());
                seen.lock().unwrap().push(online);
            })
        };
        master
            .registry()
            .light_mut(5)
            .unwrap()
            .register_callback(callback);

        drop_tx.send(()).unwrap();
        wait_until("reconnect", || calls.load(Ordering::SeqCst) >= 2).await;
        assert_eq!(*seen.lock().unwrap(), vec![Some(false), Some(true)]);
        assert!(master.is_online());
        assert!(master.is_available(5));
        assert_eq!(master.phase(), SetupPhase::Ready);

        let _peer = server.await.unwrap();
        master.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_while_reconnecting() {
        let (listener, config) = listener().await;
        let config = config.reconnect_delay(Duration::from_secs(30));
        let server = tokio::spawn(async move {
            let mut peer = Peer::accept(&listener).await;
            peer.discovery().await;
        });

        let mut master = HomeMaster::new(config);
        master.setup().await.unwrap();
        server.await.unwrap();
        wait_until("offline", || !master.is_online()).await;

        timeout(Duration::from_secs(5), master.shutdown())
            .await
            .expect("shutdown hangs")
            .unwrap();
        assert_eq!(master.phase(), SetupPhase::Disconnected);
    }
}
