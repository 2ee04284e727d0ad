pub mod upload_dir;
