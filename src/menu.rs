//! Interactive terminal menu driving the server.

use std::io::{BufRead, Write};

use tokio::runtime::Handle;
use tracing::{info, warn};

use crate::catalog::{self, FileCatalog};
use crate::error::ServerError;
use crate::net;
use crate::server::{ServerLifecycle, ShutdownSignal, StartOutcome, StopOutcome};

const MENU: &str = "\n1. Enviar Arquivos\n2. Fechar Servidor\n3. Sair\n";

/// Menu loop reading choices from `input` and reporting to `output`.
///
/// Runs on a plain thread; lifecycle calls are driven to completion on
/// `runtime`.
pub struct ControlLoop<R, W> {
    input: R,
    output: W,
    runtime: Handle,
    lifecycle: ServerLifecycle,
    catalog: FileCatalog,
}

impl<R: BufRead, W: Write> ControlLoop<R, W> {
    pub fn new(lifecycle: ServerLifecycle, runtime: Handle, input: R, output: W) -> Self {
        let catalog = FileCatalog::new(lifecycle.config().root_dir.clone());
        Self {
            input,
            output,
            runtime,
            lifecycle,
            catalog,
        }
    }

    pub fn lifecycle(&self) -> &ServerLifecycle {
        &self.lifecycle
    }

    #[cfg(test)]
    pub(crate) fn lifecycle_mut(&mut self) -> &mut ServerLifecycle {
        &mut self.lifecycle
    }

    /// Run until the user picks "Sair" or input ends.
    ///
    /// Errors are fatal for the session: unreadable serving directory,
    /// bind failure, forced shutdown, or a broken terminal.
    pub fn run(&mut self) -> Result<(), ServerError> {
        loop {
            let Some(choice) = self.read_choice()? else {
                info!("Input closed, leaving menu");
                writeln!(self.output, "\nSaindo...")?;
                return Ok(());
            };

            match choice {
                1 => self.send_files()?,
                2 => self.close_server()?,
                3 => {
                    writeln!(self.output, "\nSaindo...")?;
                    return Ok(());
                }
                _ => writeln!(self.output, "\nOpção inválida. Por favor, tente novamente.")?,
            }
        }
    }

    /// Read one line without its line ending. `None` at end of input.
    fn read_line(&mut self) -> Result<Option<String>, ServerError> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// Show the menu until a number is entered.
    fn read_choice(&mut self) -> Result<Option<i64>, ServerError> {
        loop {
            write!(self.output, "{}Escolha uma opção: ", MENU)?;
            self.output.flush()?;

            let Some(line) = self.read_line()? else {
                return Ok(None);
            };

            match line.parse::<i64>() {
                Ok(choice) => return Ok(Some(choice)),
                Err(_) => writeln!(self.output, "Por favor, insira um número válido.")?,
            }
        }
    }

    fn confirm_transfer(&mut self) -> Result<bool, ServerError> {
        writeln!(self.output, "Confirmar arquivos (s/n): ")?;
        self.output.flush()?;

        let answer = self.read_line()?.unwrap_or_default();
        Ok(matches!(answer.as_str(), "s" | "S"))
    }

    fn send_files(&mut self) -> Result<(), ServerError> {
        self.runtime.block_on(self.lifecycle.refresh())?;
        if self.lifecycle.is_running() {
            writeln!(self.output, "\nO servidor já está rodando.")?;
            return Ok(());
        }

        let entries = self.catalog.list().map_err(|source| ServerError::Catalog {
            path: self.catalog.dir().display().to_string(),
            source,
        })?;
        write!(self.output, "{}", catalog::display(&entries))?;

        if !self.confirm_transfer()? {
            writeln!(self.output, "Transferência cancelada.")?;
            return Ok(());
        }

        let signal = ShutdownSignal::new();
        match self.runtime.block_on(self.lifecycle.start(signal))? {
            StartOutcome::Started(addr) => {
                let ip = net::local_ipv4();
                if ip.is_none() {
                    warn!("No non-loopback IPv4 address found, advertised URL has no host");
                }
                writeln!(
                    self.output,
                    "\nServidor rodando em {}",
                    net::server_url(ip, addr.port())
                )?;
            }
            StartOutcome::AlreadyRunning => {
                writeln!(self.output, "\nO servidor já está rodando.")?;
            }
        }
        Ok(())
    }

    fn close_server(&mut self) -> Result<(), ServerError> {
        writeln!(self.output, "\nFechando o servidor...")?;

        match self.runtime.block_on(self.lifecycle.stop())? {
            StopOutcome::Stopped => writeln!(self.output, "Servidor desligado.")?,
            StopOutcome::NotRunning => writeln!(self.output, "O servidor não está rodando.")?,
        }
        Ok(())
    }
}
