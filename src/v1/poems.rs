pub mod poem_get;
pub mod poems_list;
pub mod upload_file;
pub mod upload_text;
pub mod version;
