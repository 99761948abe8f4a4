//! Integration tests for BeamStore
//!
//! Runs a real server on an ephemeral port and talks to it over TCP

use beamstore::{BeamStoreError, BeamStoreServer, Client, Delimiters, ServerConfig};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

const QUIET: Duration = Duration::from_millis(150);

/// Helper function to start a test server, returning its address
async fn start_test_server(config: ServerConfig) -> (Arc<BeamStoreServer>, String) {
    let server = BeamStoreServer::bind(config.bind_addr("127.0.0.1:0"))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap().to_string();
    let server = Arc::new(server);

    let running = Arc::clone(&server);
    tokio::spawn(async move {
        let _ = running.run().await;
    });

    (server, addr)
}

fn sorted(mut values: Vec<Bytes>) -> Vec<Bytes> {
    values.sort();
    values
}

#[tokio::test]
async fn test_basic_operations() {
    let (_server, addr) = start_test_server(ServerConfig::default()).await;
    let mut client = Client::connect(&addr).await.unwrap();

    client.put(b"test_key", b"test_value").await.unwrap();
    assert_eq!(client.get(b"test_key").await.unwrap(), "test_value");

    // Overwrite
    client.put(b"test_key", b"second").await.unwrap();
    assert_eq!(client.get(b"test_key").await.unwrap(), "second");

    // Missing keys read back empty rather than as an error
    assert!(client.get(b"nonexistent").await.unwrap().is_empty());

    client.del(b"test_key").await.unwrap();
    client.del(b"test_key").await.unwrap();
    assert!(client.get(b"test_key").await.unwrap().is_empty());

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_payload_with_field_delimiter() {
    let (_server, addr) = start_test_server(ServerConfig::default()).await;
    let mut client = Client::connect(&addr).await.unwrap();

    client.put(b"k", b"a\tb\t\tc").await.unwrap();
    assert_eq!(client.get(b"k").await.unwrap(), "a\tb\t\tc");

    client.put(b"empty", b"").await.unwrap();
    assert!(client.get(b"empty").await.unwrap().is_empty());
    assert_eq!(client.get_all(QUIET).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_consume_removes() {
    let (_server, addr) = start_test_server(ServerConfig::default()).await;
    let mut client = Client::connect(&addr).await.unwrap();

    client.put(b"k", b"v").await.unwrap();
    assert_eq!(client.consume(b"k").await.unwrap(), "v");
    assert!(client.get(b"k").await.unwrap().is_empty());
    assert!(client.consume(b"k").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_wildcard_operations() {
    let (_server, addr) = start_test_server(ServerConfig::default()).await;
    let mut client = Client::connect(&addr).await.unwrap();

    for i in 0..5 {
        client
            .put(format!("key{}", i).as_bytes(), format!("value{}", i).as_bytes())
            .await
            .unwrap();
    }

    let all = client.get_all(QUIET).await.unwrap();
    let expected: Vec<Bytes> = (0..5).map(|i| Bytes::from(format!("value{}", i))).collect();
    assert_eq!(sorted(all), expected);

    let consumed = client.consume_all(QUIET).await.unwrap();
    assert_eq!(sorted(consumed), expected);
    assert!(client.get_all(QUIET).await.unwrap().is_empty());

    client.put(b"a", b"1").await.unwrap();
    client.put(b"b", b"2").await.unwrap();
    client.del(b"*").await.unwrap();
    assert!(client.get_all(QUIET).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_single_reply_calls_reject_wildcard() {
    let (_server, addr) = start_test_server(ServerConfig::default()).await;
    let mut client = Client::connect(&addr).await.unwrap();
    client.put(b"a", b"1").await.unwrap();
    client.put(b"b", b"2").await.unwrap();

    assert!(matches!(client.get(b"*").await, Err(BeamStoreError::Client(_))));
    assert!(matches!(client.consume(b"*").await, Err(BeamStoreError::Client(_))));

    // Nothing was sent, so replies stay aligned and nothing was consumed
    assert_eq!(client.get(b"a").await.unwrap(), Bytes::from_static(b"1"));
    assert_eq!(
        sorted(client.get_all(QUIET).await.unwrap()),
        vec![Bytes::from_static(b"1"), Bytes::from_static(b"2")]
    );
}

#[tokio::test]
async fn test_writes_from_two_connections_are_both_visible() {
    let (_server, addr) = start_test_server(ServerConfig::default()).await;
    let mut first = Client::connect(&addr).await.unwrap();
    let mut second = Client::connect(&addr).await.unwrap();

    first.put(b"a", b"1").await.unwrap();
    second.put(b"b", b"2").await.unwrap();

    // A reply on each connection means its put has been applied
    assert_eq!(first.get(b"a").await.unwrap(), "1");
    assert_eq!(second.get(b"b").await.unwrap(), "2");

    let all = first.get_all(QUIET).await.unwrap();
    assert_eq!(
        sorted(all),
        vec![Bytes::from_static(b"1"), Bytes::from_static(b"2")]
    );
}

#[tokio::test]
async fn test_commands_on_one_connection_apply_in_order() {
    let (_server, addr) = start_test_server(ServerConfig::default().inbound_capacity(2)).await;
    let mut client = Client::connect(&addr).await.unwrap();

    // Pipeline everything before reading any reply
    for i in 0..200 {
        client.put(b"k", i.to_string().as_bytes()).await.unwrap();
        client
            .send(beamstore::Action::Get, b"k", b"")
            .await
            .unwrap();
    }
    for i in 0..200 {
        assert_eq!(client.recv().await.unwrap(), Bytes::from(i.to_string()));
    }
}

#[tokio::test]
async fn test_unrecognized_action_is_ignored() {
    let (_server, addr) = start_test_server(ServerConfig::default()).await;
    let mut client = Client::connect(&addr).await.unwrap();

    client.send_raw(b"set\tk\tv\n\nget\n").await.unwrap();
    assert!(client.recv_timeout(QUIET).await.unwrap().is_none());

    client.put(b"k", b"v").await.unwrap();
    assert_eq!(client.get(b"k").await.unwrap(), "v");
}

#[tokio::test]
async fn test_operator_commands_produce_no_reply() {
    let (_server, addr) = start_test_server(ServerConfig::default()).await;
    let mut client = Client::connect(&addr).await.unwrap();

    client.put(b"k", b"v").await.unwrap();
    client.count().await.unwrap();
    client.detail().await.unwrap();
    client.toggle_log().await.unwrap();
    client.toggle_log().await.unwrap();
    assert!(client.recv_timeout(QUIET).await.unwrap().is_none());

    assert_eq!(client.get(b"k").await.unwrap(), "v");
}

#[tokio::test]
async fn test_custom_delimiters() {
    let delimiters = Delimiters::new(b'|', b';');
    let (_server, addr) =
        start_test_server(ServerConfig::default().delimiters(delimiters)).await;
    let mut client = Client::connect_with(&addr, delimiters).await.unwrap();

    client.put(b"k", b"line one\nline|two").await.unwrap();
    assert_eq!(client.get(b"k").await.unwrap(), "line one\nline|two");
}

#[tokio::test]
async fn test_concurrent_clients() {
    let (_server, addr) = start_test_server(ServerConfig::default()).await;

    let num_clients = 10;
    let ops_per_client = 100;
    let mut handles = Vec::new();

    for client_id in 0..num_clients {
        let addr = addr.clone();
        let handle = tokio::spawn(async move {
            let mut client = Client::connect(&addr).await.unwrap();

            for i in 0..ops_per_client {
                let key = format!("client_{}_key_{}", client_id, i);
                let value = format!("client_{}_value_{}", client_id, i);

                client.put(key.as_bytes(), value.as_bytes()).await.unwrap();
                assert_eq!(client.get(key.as_bytes()).await.unwrap(), value);

                if i % 2 == 0 {
                    assert_eq!(client.consume(key.as_bytes()).await.unwrap(), value);
                }
            }

            client.close().await.unwrap();
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.await.unwrap();
    }

    let mut client = Client::connect(&addr).await.unwrap();
    let remaining = client.get_all(QUIET).await.unwrap();
    assert_eq!(remaining.len(), num_clients * ops_per_client / 2);
}

#[tokio::test]
async fn test_large_values() {
    let (_server, addr) = start_test_server(ServerConfig::default()).await;
    let mut client = Client::connect(&addr).await.unwrap();

    let large_value = "x".repeat(1024 * 1024);
    client.put(b"large_key", large_value.as_bytes()).await.unwrap();
    assert_eq!(client.get(b"large_key").await.unwrap(), large_value.as_bytes());
}

#[tokio::test]
async fn test_disconnect_does_not_affect_other_clients() {
    let (_server, addr) = start_test_server(ServerConfig::default()).await;
    let mut survivor = Client::connect(&addr).await.unwrap();

    let mut leaver = Client::connect(&addr).await.unwrap();
    leaver.put(b"k", b"v").await.unwrap();
    leaver.send(beamstore::Action::Get, b"*", b"").await.unwrap();
    drop(leaver);

    assert_eq!(survivor.get(b"k").await.unwrap(), "v");
}

#[tokio::test]
async fn test_shutdown_closes_connections() {
    let (server, addr) = start_test_server(ServerConfig::default()).await;
    let mut client = Client::connect(&addr).await.unwrap();
    client.put(b"k", b"v").await.unwrap();
    assert_eq!(client.get(b"k").await.unwrap(), "v");

    server.shutdown().unwrap();
    assert!(client.recv().await.is_err());
}

#[tokio::test]
async fn test_error_handling() {
    // Test connection to non-existent server
    let result = Client::connect("127.0.0.1:99999").await;
    assert!(result.is_err());

    let result = Client::connect_with("127.0.0.1:1", Delimiters::new(b'\n', b'\n')).await;
    assert!(result.is_err());
}
