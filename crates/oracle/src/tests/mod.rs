mod helpers;
mod dispatch_tests;
mod genesis_tests;
