//! Small helpers shared by the test modules.

/// Reads a raw channel to exhaustion.
pub async fn drain<T>(receiver: flume::Receiver<T>) -> Vec<T> {
    let mut collected = Vec::new();
    while let Ok(value) = receiver.recv_async().await {
        collected.push(value);
    }
    collected
}
