mod common;
mod competency;
mod disclosure;
mod routing;
