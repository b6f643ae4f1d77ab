mod article;

pub use article::fetch_article;
