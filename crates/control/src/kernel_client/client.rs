use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use ahash::HashMap;
use bytes::BytesMut;
use kctl::{Attributes, Flags, Header, MessageType, Record};
use parking_lot::Mutex;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::{mpsc, oneshot},
    time::{interval, timeout},
};

use crate::{
    error::Error,
    kernel_client::{pending::PendingTable, sequence::SequenceAllocator},
};

const WRITER_QUEUE_CAPACITY: usize = 64;
const NOTIFICATION_QUEUE_CAPACITY: usize = 16;

/// How often the background reaper sweeps `PendingTable` for continuations
/// whose owning task was cancelled or dropped before `request`'s own
/// timeout branch could run.
const REAP_INTERVAL: Duration = Duration::from_secs(1);

/// Multiplexes typed requests onto the single kernel control-channel
/// transport and demultiplexes responses and notifications back out of
/// it. The reader and writer halves run as independent background tasks
/// that only move bytes and resolve continuations — all RINA semantics
/// live in the callers of `request`/`notify`.
pub struct KernelClient {
    local_ipcp_id: u16,
    request_timeout: Duration,
    sequence: Mutex<SequenceAllocator>,
    pending: Arc<Mutex<PendingTable>>,
    writer_tx: mpsc::Sender<Vec<u8>>,
    subscribers: Arc<Mutex<HashMap<MessageType, Vec<mpsc::Sender<Record>>>>>,
}

impl KernelClient {
    /// Spawn the reader/writer tasks over `transport` and return a handle.
    pub fn spawn<T>(local_ipcp_id: u16, transport: T, request_timeout: Duration) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(transport);
        let (writer_tx, writer_rx) = mpsc::channel(WRITER_QUEUE_CAPACITY);
        let pending = Arc::new(Mutex::new(PendingTable::new()));
        let subscribers = Arc::new(Mutex::new(HashMap::default()));

        tokio::spawn(Self::writer_task(writer, writer_rx));
        tokio::spawn(Self::reader_task(reader, pending.clone(), subscribers.clone()));
        tokio::spawn(Self::reaper_task(pending.clone()));

        Self {
            local_ipcp_id,
            request_timeout,
            sequence: Mutex::new(SequenceAllocator::new()),
            pending,
            writer_tx,
            subscribers,
        }
    }

    /// Send a request and wait for its matching response, subject to
    /// `request_timeout`. Returns `Error::KernelBusy` synchronously,
    /// before anything is written, if the writer's queue is full.
    pub async fn request(
        &self,
        destination_ipcp_id: u16,
        destination_port: u32,
        message_type: MessageType,
        attrs: Attributes,
    ) -> Result<Record, Error> {
        debug_assert!(!message_type.is_fire_and_forget());

        let sequence_number = self.sequence.lock().next();
        let (tx, rx) = oneshot::channel();
        let deadline = Instant::now() + self.request_timeout;
        self.pending.lock().insert(sequence_number, tx, deadline);

        let record = Record {
            header: Header {
                sequence_number,
                source_ipcp_id: self.local_ipcp_id,
                destination_ipcp_id,
                destination_port,
                message_type,
                flags: Flags::request(),
            },
            attrs,
        };

        if self.enqueue(&record).is_err() {
            self.pending.lock().take(sequence_number);
            return Err(Error::KernelBusy);
        }

        match timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ChannelClosed),
            Err(_) => {
                self.pending.lock().take(sequence_number);
                Err(Error::Timeout)
            }
        }
    }

    /// Send a fire-and-forget request with no matching response.
    pub fn notify(
        &self,
        destination_ipcp_id: u16,
        destination_port: u32,
        message_type: MessageType,
        attrs: Attributes,
    ) -> Result<(), Error> {
        debug_assert!(message_type.is_fire_and_forget());

        let sequence_number = self.sequence.lock().next();
        let record = Record {
            header: Header {
                sequence_number,
                source_ipcp_id: self.local_ipcp_id,
                destination_ipcp_id,
                destination_port,
                message_type,
                flags: Flags::request(),
            },
            attrs,
        };

        self.enqueue(&record)
    }

    /// Subscribe to unsolicited notifications of one message type (e.g. a
    /// remotely arrived flow allocation request).
    pub fn subscribe(&self, message_type: MessageType) -> mpsc::Receiver<Record> {
        let (tx, rx) = mpsc::channel(NOTIFICATION_QUEUE_CAPACITY);
        self.subscribers.lock().entry(message_type).or_default().push(tx);
        rx
    }

    fn enqueue(&self, record: &Record) -> Result<(), Error> {
        let mut buf = BytesMut::new();
        record.encode(&mut buf);
        self.writer_tx.try_send(buf.to_vec()).map_err(|_| Error::KernelBusy)
    }

    async fn writer_task(mut writer: impl AsyncWrite + Unpin, mut rx: mpsc::Receiver<Vec<u8>>) {
        while let Some(bytes) = rx.recv().await {
            if writer.write_all(&bytes).await.is_err() {
                break;
            }
        }
    }

    async fn reader_task(
        mut reader: impl AsyncRead + Unpin,
        pending: Arc<Mutex<PendingTable>>,
        subscribers: Arc<Mutex<HashMap<MessageType, Vec<mpsc::Sender<Record>>>>>,
    ) {
        let mut buf = BytesMut::with_capacity(4096);
        let mut chunk = [0u8; 4096];

        loop {
            let read = match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            buf.extend_from_slice(&chunk[..read]);

            while let Ok(Some(record)) = Record::decode(&mut buf) {
                if record.header.flags.is_response() {
                    if let Some(continuation) = pending.lock().take(record.header.sequence_number) {
                        continuation.resolve(Ok(record));
                    }
                } else if record.header.flags.is_notification() {
                    let subs = subscribers.lock();
                    if let Some(list) = subs.get(&record.header.message_type) {
                        for tx in list {
                            let _ = tx.try_send(record.clone());
                        }
                    }
                }
            }
        }

        pending.lock().fail_all();
    }

    /// Periodically resolve continuations that have outlived their
    /// deadline without a reader-observed response or channel close — the
    /// case where the task awaiting `request` was cancelled or dropped
    /// before its own timeout branch could run.
    async fn reaper_task(pending: Arc<Mutex<PendingTable>>) {
        let mut ticker = interval(REAP_INTERVAL);
        loop {
            ticker.tick().await;
            pending.lock().reap_expired(Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use kctl::{Flags, Header, Tag};
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    use super::*;

    fn spawn_pair(request_timeout: Duration) -> (KernelClient, DuplexStream) {
        let (client_side, peer_side) = tokio::io::duplex(4096);
        let client = KernelClient::spawn(1, client_side, request_timeout);
        (client, peer_side)
    }

    async fn read_one_record(peer: &mut DuplexStream) -> Record {
        let mut buf = BytesMut::with_capacity(256);
        loop {
            if let Ok(Some(record)) = Record::decode(&mut buf) {
                return record;
            }
            let mut chunk = [0u8; 256];
            let n = peer.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    async fn write_response(peer: &mut DuplexStream, request: &Header, attrs: Attributes) {
        let record = Record {
            header: Header {
                sequence_number: request.sequence_number,
                source_ipcp_id: request.destination_ipcp_id,
                destination_ipcp_id: request.source_ipcp_id,
                destination_port: request.destination_port,
                message_type: request.message_type,
                flags: Flags::response(),
            },
            attrs,
        };
        let mut wire = BytesMut::new();
        record.encode(&mut wire);
        peer.write_all(&wire).await.unwrap();
    }

    #[tokio::test]
    async fn request_resolves_on_matching_response() {
        let (client, mut peer) = spawn_pair(Duration::from_secs(5));

        let request = tokio::spawn(async move {
            client
                .request(0, 0, MessageType::AssignToDif, Attributes::new())
                .await
        });

        let sent = read_one_record(&mut peer).await;
        let mut attrs = Attributes::new();
        attrs.push_i32(Tag::Result, 0);
        write_response(&mut peer, &sent.header, attrs).await;

        let record = request.await.unwrap().unwrap();
        assert_eq!(record.attrs.get_i32(Tag::Result), Some(0));
    }

    #[tokio::test]
    async fn concurrent_requests_resolve_out_of_order_by_sequence_number() {
        let (client, mut peer) = spawn_pair(Duration::from_secs(5));
        let client = std::sync::Arc::new(client);

        let mut handles = Vec::new();
        for _ in 0..5 {
            let client = client.clone();
            handles.push(tokio::spawn(async move {
                client
                    .request(0, 0, MessageType::DumpPduft, Attributes::new())
                    .await
            }));
        }

        let mut sent = Vec::new();
        for _ in 0..5 {
            sent.push(read_one_record(&mut peer).await);
        }
        // Reply in reverse order: each continuation must still resolve to
        // its own sequence number, not positionally.
        for record in sent.iter().rev() {
            let mut attrs = Attributes::new();
            attrs.push_i32(Tag::Result, 0);
            attrs.push_u32(Tag::PortId, record.header.sequence_number);
            write_response(&mut peer, &record.header, attrs).await;
        }

        for (i, handle) in handles.into_iter().enumerate() {
            let record = handle.await.unwrap().unwrap();
            assert_eq!(record.attrs.get_u32(Tag::PortId), Some(sent[i].header.sequence_number));
        }
    }

    #[tokio::test]
    async fn response_with_unknown_sequence_number_is_dropped_not_delivered() {
        let (client, mut peer) = spawn_pair(Duration::from_millis(200));

        let request = tokio::spawn(async move {
            client
                .request(0, 0, MessageType::AssignToDif, Attributes::new())
                .await
        });

        let sent = read_one_record(&mut peer).await;

        // A response carrying a sequence number nobody is waiting on.
        let mut stray_header = sent.header;
        stray_header.sequence_number = stray_header.sequence_number.wrapping_add(999);
        let mut attrs = Attributes::new();
        attrs.push_i32(Tag::Result, 0);
        write_response(&mut peer, &stray_header, attrs).await;

        // The real request is left hanging and times out; the stray
        // response must not have resolved it.
        assert!(matches!(request.await.unwrap(), Err(Error::Timeout)));
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_request_times_out_and_is_removed() {
        let (client, _peer) = spawn_pair(Duration::from_millis(50));

        let result = client
            .request(0, 0, MessageType::AssignToDif, Attributes::new())
            .await;

        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn notify_sends_fire_and_forget_with_no_response_expected() {
        let (client, mut peer) = spawn_pair(Duration::from_secs(5));

        client
            .notify(0, 0, MessageType::ModifyPduft, Attributes::new())
            .unwrap();

        let sent = read_one_record(&mut peer).await;
        assert_eq!(sent.header.message_type, MessageType::ModifyPduft);
        assert!(sent.header.flags.is_request());
    }

    #[tokio::test]
    async fn subscribers_receive_notifications_routed_by_message_type() {
        let (client, mut peer) = spawn_pair(Duration::from_secs(5));
        let mut rx = client.subscribe(MessageType::AllocateFlowArrived);

        let record = Record {
            header: Header {
                sequence_number: 1,
                source_ipcp_id: 0,
                destination_ipcp_id: 1,
                destination_port: 7,
                message_type: MessageType::AllocateFlowArrived,
                flags: Flags::notification(),
            },
            attrs: Attributes::new(),
        };
        let mut wire = BytesMut::new();
        record.encode(&mut wire);
        peer.write_all(&wire).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.header.destination_port, 7);
    }

    #[tokio::test]
    async fn transport_close_fails_every_outstanding_request() {
        let (client, peer) = spawn_pair(Duration::from_secs(5));
        let client = std::sync::Arc::new(client);

        let c = client.clone();
        let request = tokio::spawn(async move {
            c.request(0, 0, MessageType::AssignToDif, Attributes::new()).await
        });

        drop(peer);

        assert!(matches!(request.await.unwrap(), Err(Error::ChannelClosed)));
    }
}
