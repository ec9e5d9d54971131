mod bounds;
mod closed_loop;
mod runner;
mod scenarios;
mod support;
