pub mod gpu_vm;
