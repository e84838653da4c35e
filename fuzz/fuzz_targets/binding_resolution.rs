#![no_main]

use ferrous_kernel::{Binding, Kernel, ParameterDescriptor, Resolver, TypeRegistry};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

trait Plugin: Send + Sync {
    fn id(&self) -> u8;
}

struct StaticPlugin(u8);

impl Plugin for StaticPlugin {
    fn id(&self) -> u8 {
        self.0
    }
}

struct Host {
    plugins: Vec<Arc<dyn Plugin>>,
}

struct Cycle;

fuzz_target!(|data: &[u8]| {
    let registry = TypeRegistry::new();
    registry
        .register::<Host>()
        .constructor([ParameterDescriptor::many::<dyn Plugin>("plugins")], |args| {
            Ok(Host { plugins: args.all(0)? })
        });
    registry
        .register::<Cycle>()
        .constructor([ParameterDescriptor::single::<Cycle>("cycle")], |_| Ok(Cycle));
    let kernel = Kernel::new(Arc::new(registry));

    // Each byte is one operation: the low bits pick it, the rest is its argument.
    let mut registered: Vec<u8> = Vec::new();
    for byte in data {
        let argument = byte >> 3;
        match byte & 0b111 {
            0 => {
                kernel.add_binding(
                    Binding::bind::<dyn Plugin>()
                        .to_constant(Arc::new(StaticPlugin(argument)))
                        .build(),
                );
                registered.push(argument);
            }
            1 => {
                kernel.add_binding(
                    Binding::bind::<dyn Plugin>()
                        .to_factory(move |_| Ok(Arc::new(StaticPlugin(argument)) as Arc<dyn Plugin>))
                        .in_singleton_scope()
                        .build(),
                );
                registered.push(argument);
            }
            2 => {
                let host = kernel.get::<Host>().unwrap();
                let ids: Vec<u8> = host.plugins.iter().map(|p| p.id()).collect();
                assert_eq!(ids, registered);
            }
            3 => {
                let single = kernel.get::<dyn Plugin>();
                match registered.len() {
                    0 => assert!(single.unwrap_err().is_missing_binding()),
                    1 => assert_eq!(single.unwrap().id(), registered[0]),
                    _ => assert!(single.is_err()),
                }
            }
            4 => {
                kernel.unbind::<dyn Plugin>();
                registered.clear();
            }
            5 => {
                assert!(kernel.get::<Cycle>().unwrap_err().is_circular());
            }
            6 => {
                let block = kernel.begin_block();
                let _ = block.get_all::<dyn Plugin>().unwrap();
                block.end();
            }
            _ => {
                kernel.dispose();
            }
        }
    }
});
