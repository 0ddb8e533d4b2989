#![cfg(test)]
mod oracle;
mod registry;
mod replication;
mod schema;
mod slot;
