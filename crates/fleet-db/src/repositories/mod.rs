// Statements are plain functions over a leased `Connection` so the same code
// runs on a single lease (reads, inserts) and inside `transaction::run`
// (read-modify-write updates).

pub mod vehicle;
