mod interception;
mod lifecycle;
mod support;
