// Collaborator contracts the pipeline core depends on
pub mod ports;
