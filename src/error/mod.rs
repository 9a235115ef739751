mod subcast;

pub use subcast::SubcastError;
