use std::io;

/// Line-oriented output sink, swapped for a recorder in tests
pub trait Terminal {
    fn write(&mut self, text: &str) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
}

pub struct StdTerminal;

impl Terminal for StdTerminal {
    fn write(&mut self, text: &str) -> io::Result<()> {
        print!("{text}");
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        use io::Write;
        io::stdout().flush()
    }
}

#[cfg(test)]
#[derive(Default)]
pub struct MockTerminal {
    pub outputs: Vec<String>,
    pub flushes: usize,
}

#[cfg(test)]
impl MockTerminal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn joined(&self) -> String {
        self.outputs.concat()
    }
}

#[cfg(test)]
impl Terminal for MockTerminal {
    fn write(&mut self, text: &str) -> io::Result<()> {
        self.outputs.push(text.to_string());
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }
}
