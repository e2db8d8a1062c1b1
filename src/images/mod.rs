pub mod filenames;
pub mod services;

#[cfg(test)]
mod tests;
