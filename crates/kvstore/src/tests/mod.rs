mod helpers;
mod txn_tests;
