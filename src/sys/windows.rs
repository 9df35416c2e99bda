pub use std::os::windows::io::{
	AsRawSocket,
	RawSocket,
};

pub fn as_raw_socket(socket: &impl AsRawSocket) -> RawSocket {
	socket.as_raw_socket()
}
