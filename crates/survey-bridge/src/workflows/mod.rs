pub mod skills_match;
