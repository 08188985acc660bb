mod common;

mod drafts;
mod template;
