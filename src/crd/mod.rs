pub mod groupsync;

#[cfg(test)]
#[path = "groupsync_test.rs"]
mod groupsync_tests;
