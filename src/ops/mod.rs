pub mod cancel;
pub mod drafts;
pub mod ignore_ops;
pub mod inference;
pub mod note_ops;
pub mod reconcile;
pub mod scanner;
pub mod tree;
