pub use std::os::fd::{
	AsRawFd as AsRawSocket,
	RawFd as RawSocket,
};

pub fn as_raw_socket(socket: &impl AsRawSocket) -> RawSocket {
	socket.as_raw_fd()
}
