mod once_queue;

pub use once_queue::OnceQueue;
