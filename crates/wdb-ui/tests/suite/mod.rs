mod breakpoints;
mod helpers;
mod inspect;
mod navigation;
mod session_open;
mod stepping;
mod watch;
