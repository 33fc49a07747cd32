//! Wire-level tests for gameroom
//!
//! These tests speak the record protocol over a raw TCP stream instead of
//! going through [`gameroom::Client`], so they can send byte sequences the
//! client API would never produce: malformed JSON, unknown actions, split
//! writes, and coalesced records.

use gameroom::protocol::framing::RecordDecoder;
use gameroom::protocol::{decode_reply, encode_request};
use gameroom::{Action, ErrorKind, Reply, Request, Server, Status};
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

struct TestServer {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

fn start_server() -> TestServer {
    let mut server = Server::bind("127.0.0.1:0").expect("bind test server");
    let addr = server.local_addr();
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    let handle = thread::spawn(move || {
        server.run(&flag);
        server.shutdown();
    });
    TestServer {
        addr,
        shutdown,
        handle: Some(handle),
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Connect raw and consume the `REGISTER_CLIENT` envelope the server sends
/// first. Returns the stream, a primed decoder, and the assigned id.
fn raw_connect(addr: SocketAddr) -> (TcpStream, RecordDecoder, u64) {
    let stream = TcpStream::connect(addr).expect("connect");
    stream
        .set_read_timeout(Some(Duration::from_millis(10)))
        .expect("set read timeout");
    let mut stream = stream;
    let mut decoder = RecordDecoder::new();

    let registration = read_replies(&mut stream, &mut decoder, 1).remove(0);
    assert_eq!(registration.action, Action::RegisterClient);
    assert_eq!(registration.status, Status::Success);
    let client_id = registration.client_id.expect("assigned id");

    (stream, decoder, client_id)
}

/// Read until `want` decodable replies have arrived or two seconds pass.
fn read_replies(stream: &mut TcpStream, decoder: &mut RecordDecoder, want: usize) -> Vec<Reply> {
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut replies = Vec::new();
    let mut buf = [0u8; 4096];
    while replies.len() < want {
        assert!(Instant::now() < deadline, "timed out waiting for replies");
        let n = match stream.read(&mut buf) {
            Ok(0) => panic!("server closed the connection"),
            Ok(n) => n,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                continue;
            }
            Err(e) => panic!("read failed: {e}"),
        };
        let records = decoder.feed(&buf[..n]).expect("well-formed stream");
        for record in records {
            if !record.is_empty() {
                replies.push(decode_reply(&record).expect("decodable reply"));
            }
        }
    }
    replies
}

/// Assert the server sends nothing decodable for `window`.
fn assert_no_reply_within(stream: &mut TcpStream, decoder: &mut RecordDecoder, window: Duration) {
    let deadline = Instant::now() + window;
    let mut buf = [0u8; 1024];
    while Instant::now() < deadline {
        match stream.read(&mut buf) {
            Ok(0) => panic!("server closed the connection"),
            Ok(n) => {
                let records = decoder.feed(&buf[..n]).expect("well-formed stream");
                assert!(
                    records.iter().all(Vec::is_empty),
                    "unexpected reply arrived"
                );
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
            Err(e) => panic!("read failed: {e}"),
        }
    }
}

#[test]
fn test_malformed_json_is_dropped_and_connection_survives() {
    let server = start_server();
    let (mut stream, mut decoder, client_id) = raw_connect(server.addr);

    stream.write_all(b"{oops\x07").expect("write garbage");
    stream
        .write_all(&encode_request(&Request::GetRoomsInfo { client_id }))
        .expect("write valid request");

    // The only reply is for the valid request; no error envelope, no close.
    let reply = read_replies(&mut stream, &mut decoder, 1).remove(0);
    assert_eq!(reply.action, Action::GetRoomsInfo);
    assert_eq!(reply.status, Status::Success);
}

#[test]
fn test_unknown_action_is_dropped_silently() {
    let server = start_server();
    let (mut stream, mut decoder, client_id) = raw_connect(server.addr);

    stream
        .write_all(b"{\"action\":\"FLY_TO_MOON\",\"clientId\":0}\x07")
        .expect("write unknown action");
    assert_no_reply_within(&mut stream, &mut decoder, Duration::from_millis(100));

    stream
        .write_all(&encode_request(&Request::LeaveRoom { client_id }))
        .expect("write valid request");
    let reply = read_replies(&mut stream, &mut decoder, 1).remove(0);
    assert_eq!(reply.action, Action::LeaveRoom);
}

#[test]
fn test_server_initiated_codes_are_not_accepted_as_requests() {
    let server = start_server();
    let (mut stream, mut decoder, client_id) = raw_connect(server.addr);

    // These two codes only ever flow server-to-client.
    stream
        .write_all(b"{\"action\":\"REGISTER_CLIENT\",\"clientId\":0}\x07")
        .expect("write register-client");
    stream
        .write_all(b"{\"action\":\"GET_MESSAGE\",\"clientId\":0,\"senderId\":5,\"message\":\"hi\"}\x07")
        .expect("write get-message");
    assert_no_reply_within(&mut stream, &mut decoder, Duration::from_millis(100));

    stream
        .write_all(&encode_request(&Request::GetRoomsInfo { client_id }))
        .expect("write valid request");
    let reply = read_replies(&mut stream, &mut decoder, 1).remove(0);
    assert_eq!(reply.action, Action::GetRoomsInfo);
}

#[test]
fn test_bare_delimiters_are_ignored() {
    let server = start_server();
    let (mut stream, mut decoder, client_id) = raw_connect(server.addr);

    stream.write_all(b"\x07\x07\x07").expect("write bare delimiters");
    stream
        .write_all(&encode_request(&Request::LeaveRoom { client_id }))
        .expect("write valid request");

    let reply = read_replies(&mut stream, &mut decoder, 1).remove(0);
    assert_eq!(reply.action, Action::LeaveRoom);
    assert_eq!(reply.status, Status::Success);
}

#[test]
fn test_record_split_across_writes_is_reassembled() {
    let server = start_server();
    let (mut stream, mut decoder, client_id) = raw_connect(server.addr);

    let record = encode_request(&Request::RegisterRoom {
        client_id,
        capacity: 3,
    });
    let (head, tail) = record.split_at(record.len() / 2);

    stream.write_all(head).expect("write first half");
    stream.flush().expect("flush");
    thread::sleep(Duration::from_millis(50));
    stream.write_all(tail).expect("write second half");

    let reply = read_replies(&mut stream, &mut decoder, 1).remove(0);
    assert_eq!(reply.action, Action::RegisterRoom);
    assert_eq!(reply.status, Status::Success);
    assert!(reply.room_id.is_some());
}

#[test]
fn test_coalesced_records_are_answered_in_order() {
    let server = start_server();
    let (mut stream, mut decoder, client_id) = raw_connect(server.addr);

    let mut batch = encode_request(&Request::RegisterRoom {
        client_id,
        capacity: 2,
    });
    batch.extend(encode_request(&Request::GetRoomsInfo { client_id }));
    stream.write_all(&batch).expect("write batch");

    let replies = read_replies(&mut stream, &mut decoder, 2);
    assert_eq!(replies[0].action, Action::RegisterRoom);
    assert_eq!(replies[1].action, Action::GetRoomsInfo);
    // The second request already sees the room the first one created.
    let listed = replies[1].rooms_info.as_ref().expect("rooms listed");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].capacity, 2);
}

#[test]
fn test_pipelined_disconnect_then_join_leaves_no_member() {
    let server = start_server();
    let (mut stream, mut decoder, client_id) = raw_connect(server.addr);

    stream
        .write_all(&encode_request(&Request::RegisterRoom {
            client_id,
            capacity: 2,
        }))
        .expect("write create");
    let room_id = read_replies(&mut stream, &mut decoder, 1)
        .remove(0)
        .room_id
        .expect("room id");

    // DISCONNECT and JOIN_ROOM coalesced into one write: the join lands
    // after the registry entry is gone and must not seat the departed id.
    let mut batch = encode_request(&Request::Disconnect { client_id });
    batch.extend(encode_request(&Request::JoinRoom { client_id, room_id }));
    stream.write_all(&batch).expect("write batch");

    let (mut viewer, mut viewer_decoder, viewer_id) = raw_connect(server.addr);
    viewer
        .write_all(&encode_request(&Request::GetRoomInfo {
            client_id: viewer_id,
            room_id,
        }))
        .expect("write room info");
    let info = read_replies(&mut viewer, &mut viewer_decoder, 1).remove(0);
    assert_eq!(info.status, Status::Success);
    assert_eq!(info.size, Some(0));
    assert_eq!(info.client_ids, Some(vec![]));
}

#[test]
fn test_already_in_room_wins_over_not_found() {
    let server = start_server();
    let (mut stream, mut decoder, client_id) = raw_connect(server.addr);

    stream
        .write_all(&encode_request(&Request::RegisterRoom {
            client_id,
            capacity: 2,
        }))
        .expect("write create");
    let created = read_replies(&mut stream, &mut decoder, 1).remove(0);
    let room_id = created.room_id.expect("room id");

    stream
        .write_all(&encode_request(&Request::JoinRoom { client_id, room_id }))
        .expect("write join");
    read_replies(&mut stream, &mut decoder, 1);

    // Joining a nonexistent room while already in one reports membership,
    // not the missing room.
    stream
        .write_all(&encode_request(&Request::JoinRoom {
            client_id,
            room_id: 99,
        }))
        .expect("write second join");
    let reply = read_replies(&mut stream, &mut decoder, 1).remove(0);
    assert_eq!(reply.status, Status::Error);
    assert_eq!(reply.error, Some(ErrorKind::AlreadyInRoom));
}

#[test]
fn test_autojoin_with_zero_capacity_reports_full_room() {
    let server = start_server();
    let (mut stream, mut decoder, client_id) = raw_connect(server.addr);

    stream
        .write_all(&encode_request(&Request::AutojoinRoom {
            client_id,
            capacity: 0,
        }))
        .expect("write autojoin");
    let reply = read_replies(&mut stream, &mut decoder, 1).remove(0);
    assert_eq!(reply.status, Status::Error);
    assert_eq!(reply.error, Some(ErrorKind::RoomFull));

    // The fallback room was created anyway and sticks around empty.
    stream
        .write_all(&encode_request(&Request::GetRoomsInfo { client_id }))
        .expect("write rooms info");
    let rooms = read_replies(&mut stream, &mut decoder, 1)
        .remove(0)
        .rooms_info
        .expect("rooms listed");
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].capacity, 0);
    assert_eq!(rooms[0].size, 0);
}
