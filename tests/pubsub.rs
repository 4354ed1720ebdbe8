//! Fire-and-forget delivery semantics over real connections.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tidepool::protocol::{Command, Response};
use tidepool::pubsub::Broker;
use tidepool::storage::Store;
use tidepool::{TcpClient, TcpServer};
use tokio::time::timeout;

async fn start_server() -> Result<SocketAddr> {
    let server = TcpServer::bind("127.0.0.1:0", Store::shared(), Arc::new(Broker::new())).await?;
    let addr = server.local_addr()?;
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    Ok(addr)
}

async fn connect(addr: SocketAddr) -> Result<TcpClient> {
    Ok(TcpClient::connect(&addr.to_string()).await?)
}

async fn subscribe(client: &mut TcpClient, channels: &[&str]) -> Result<Response> {
    Ok(client
        .execute(Command::Subscribe {
            channels: channels.iter().map(|c| c.to_string()).collect(),
        })
        .await?)
}

async fn publish(client: &mut TcpClient, channel: &str, payload: &str) -> Result<i64> {
    match client
        .execute(Command::Publish {
            channel: channel.into(),
            payload: payload.into(),
        })
        .await?
    {
        Response::Integer(delivered) => Ok(delivered),
        other => anyhow::bail!("unexpected publish response: {:?}", other),
    }
}

#[tokio::test]
async fn messages_before_subscribe_are_never_delivered() -> Result<()> {
    let addr = start_server().await?;
    let mut publisher = connect(addr).await?;

    // nobody is listening yet
    assert_eq!(publish(&mut publisher, "myevents", "too early").await?, 0);

    let mut subscriber = connect(addr).await?;
    assert_eq!(
        subscribe(&mut subscriber, &["myevents"]).await?,
        Response::Integer(1)
    );

    assert_eq!(publish(&mut publisher, "myevents", "on time").await?, 1);

    let event = timeout(Duration::from_secs(1), subscriber.next_event())
        .await??
        .expect("subscription ended unexpectedly");
    assert_eq!(event.channel, "myevents");
    assert_eq!(event.payload, "on time");

    // nothing buffered, nothing replayed
    let quiet = timeout(Duration::from_millis(100), subscriber.next_event()).await;
    assert!(quiet.is_err());
    Ok(())
}

#[tokio::test]
async fn deliveries_preserve_publish_order() -> Result<()> {
    let addr = start_server().await?;
    let mut subscriber = connect(addr).await?;
    subscribe(&mut subscriber, &["myevents"]).await?;

    let mut publisher = connect(addr).await?;
    for n in 0..5 {
        assert_eq!(
            publish(&mut publisher, "myevents", &format!("the number is {}", n)).await?,
            1
        );
    }

    for n in 0..5 {
        let event = timeout(Duration::from_secs(1), subscriber.next_event())
            .await??
            .expect("subscription ended unexpectedly");
        assert_eq!(event.payload, format!("the number is {}", n));
    }
    Ok(())
}

#[tokio::test]
async fn every_subscriber_receives_each_message() -> Result<()> {
    let addr = start_server().await?;
    let mut reader1 = connect(addr).await?;
    let mut reader2 = connect(addr).await?;
    subscribe(&mut reader1, &["myevents"]).await?;
    subscribe(&mut reader2, &["myevents"]).await?;

    let mut publisher = connect(addr).await?;
    assert_eq!(publish(&mut publisher, "myevents", "fan out").await?, 2);

    for reader in [&mut reader1, &mut reader2] {
        let event = timeout(Duration::from_secs(1), reader.next_event())
            .await??
            .expect("subscription ended unexpectedly");
        assert_eq!(event.payload, "fan out");
    }
    Ok(())
}

#[tokio::test]
async fn sessions_can_subscribe_to_multiple_channels() -> Result<()> {
    let addr = start_server().await?;
    let mut subscriber = connect(addr).await?;
    assert_eq!(
        subscribe(&mut subscriber, &["myevents", "myotherevents"]).await?,
        Response::Integer(2)
    );

    let mut publisher = connect(addr).await?;
    assert_eq!(publish(&mut publisher, "myevents", "first").await?, 1);
    assert_eq!(publish(&mut publisher, "myotherevents", "second").await?, 1);

    let event = timeout(Duration::from_secs(1), subscriber.next_event())
        .await??
        .expect("subscription ended unexpectedly");
    assert_eq!((event.channel.as_str(), event.payload.as_str()), ("myevents", "first"));

    let event = timeout(Duration::from_secs(1), subscriber.next_event())
        .await??
        .expect("subscription ended unexpectedly");
    assert_eq!(
        (event.channel.as_str(), event.payload.as_str()),
        ("myotherevents", "second")
    );
    Ok(())
}

#[tokio::test]
async fn unsubscribe_stops_delivery() -> Result<()> {
    let addr = start_server().await?;
    let mut subscriber = connect(addr).await?;
    subscribe(&mut subscriber, &["myevents"]).await?;

    let response = subscriber
        .execute(Command::Unsubscribe { channels: vec![] })
        .await?;
    assert_eq!(response, Response::Integer(0));

    let mut publisher = connect(addr).await?;
    assert_eq!(publish(&mut publisher, "myevents", "into the void").await?, 0);
    Ok(())
}

#[tokio::test]
async fn disconnect_removes_the_subscription() -> Result<()> {
    let addr = start_server().await?;
    let mut subscriber = connect(addr).await?;
    subscribe(&mut subscriber, &["myevents"]).await?;

    let mut publisher = connect(addr).await?;
    assert_eq!(publish(&mut publisher, "myevents", "reaches one").await?, 1);

    drop(subscriber);

    // cleanup runs when the server notices the closed socket; poll until it has
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if publish(&mut publisher, "myevents", "reaches nobody").await? == 0 {
            break;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("subscriber was never cleaned up after disconnect");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Ok(())
}
