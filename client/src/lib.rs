//! # Grid Battle Client Library
//!
//! A thin terminal front end for the battle server. It does no game logic of
//! its own: typed lines are forwarded as commands, and whatever the server
//! sends back (state frames, or the `Server full` rejection) is printed as-is.
//!
//! The relay loops are generic over tokio's async I/O traits so they can be
//! driven by sockets and stdio in the binary and by in-memory mocks in tests.

pub mod network;
